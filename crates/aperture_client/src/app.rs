use std::env;
use std::io;
use std::path::{Path, PathBuf};

use aperture_shared::frame::{EulerYxz, Pose};
use aperture_shared::portal::PortalError;
use glam::Vec3;
use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};
use winit::keyboard::KeyCode;

use crate::input::InputState;
use crate::level::{Level, PortalSlot};
use crate::renderer::pipeline::plan_passes;
use crate::renderer::{RecordingBackend, RenderStats};
use crate::sandbox::{SandboxBody, SandboxWorld};
use crate::settings::ClientSettings;

const SETTINGS_FILE: &str = "aperture.toml";
const DEFAULT_FRAMES: u32 = 240;
const FIXED_DT: f32 = 1.0 / 60.0;
const STATS_INTERVAL: u32 = 60;

const CORRIDOR_HALF_WIDTH: f32 = 2.0;
const CORRIDOR_HEIGHT: f32 = 3.0;
const CORRIDOR_DEPTH: f32 = 10.0;
const EYE_HEIGHT: f32 = 1.5;

struct RunConfig {
    settings_path: PathBuf,
    frames: u32,
}

pub fn run() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();

    let config = parse_args();
    let settings = load_or_create_settings(&config.settings_path);
    if let Err(err) = run_demo(settings, config.frames) {
        eprintln!("demo failed: {err}");
        std::process::exit(1);
    }
}

fn parse_args() -> RunConfig {
    let mut config = RunConfig {
        settings_path: PathBuf::from(SETTINGS_FILE),
        frames: DEFAULT_FRAMES,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--settings" => {
                let Some(value) = args.next() else {
                    eprintln!("--settings expects a path argument");
                    std::process::exit(2);
                };
                config.settings_path = PathBuf::from(value);
            }
            "--frames" => {
                let Some(value) = args.next() else {
                    eprintln!("--frames expects a numeric argument");
                    std::process::exit(2);
                };
                match value.parse::<u32>() {
                    Ok(parsed) => config.frames = parsed,
                    Err(err) => {
                        eprintln!("invalid frame count '{value}': {err}");
                        std::process::exit(2);
                    }
                }
            }
            "--help" | "-h" => {
                println!("Usage: aperture_client [--settings <path>] [--frames <n>]");
                std::process::exit(0);
            }
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(2);
            }
        }
    }
    config
}

fn load_or_create_settings(path: &Path) -> ClientSettings {
    match ClientSettings::load(path) {
        Ok(settings) => settings,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let settings = ClientSettings::default();
            if let Err(save_err) = settings.save(path) {
                warn!(
                    "Failed to create default settings at {}: {save_err}",
                    path.display()
                );
            }
            settings
        }
        Err(err) => {
            warn!("Failed to load settings from {}: {err}", path.display());
            ClientSettings::default()
        }
    }
}

/// Corridor with the primary portal on the far wall ahead and the
/// secondary shot onto the wall behind.
fn build_demo_level(
    settings: ClientSettings,
) -> Result<Level<SandboxWorld, SandboxBody>, PortalError> {
    let world = SandboxWorld::corridor(CORRIDOR_HALF_WIDTH, CORRIDOR_HEIGHT, CORRIDOR_DEPTH);
    let body = SandboxBody::new(Pose::look_to(
        Vec3::new(0.0, EYE_HEIGHT, 0.0),
        Vec3::NEG_Z,
        Vec3::Y,
    ));
    let mut level = Level::new(world, body, settings);

    level.spawn_portal(
        PortalSlot::Primary,
        Vec3::new(0.0, EYE_HEIGHT, -CORRIDOR_DEPTH),
        EulerYxz::default(),
    )?;
    let placed = level.try_place_portal(
        Vec3::new(0.0, EYE_HEIGHT, CORRIDOR_DEPTH),
        Vec3::NEG_Z,
        PortalSlot::Secondary,
    );
    if !placed {
        warn!("Secondary portal did not fit on the back wall");
    }
    Ok(level)
}

fn run_demo(settings: ClientSettings, frames: u32) -> Result<u32, PortalError> {
    let depth = settings.recursion_depth;
    let mut level = build_demo_level(settings)?;
    info!(
        "Demo corridor ready: {} solids, {} portals, {} frame colliders",
        level.world().solid_count(),
        level.arena().len(),
        level.world().collider_count()
    );

    let mut input = InputState::default();
    input.press_key(KeyCode::KeyW);

    let mut backend = RecordingBackend::new();
    let mut pipeline_states = FxHashSet::default();
    let mut totals = RenderStats::default();
    let mut gpu_passes = 0usize;
    let mut teleports = 0u32;

    for frame in 0..frames {
        level.body_mut().advance(FIXED_DT);
        if let Some(crossing) = level.update(&mut input, FIXED_DT)? {
            teleports += 1;
            info!(
                "Frame {frame}: crossed {} -> {}",
                crossing.entered, crossing.exited
            );
        }
        input.clear_frame();

        backend.reset();
        let camera = level.camera();
        let stats = level.render(&mut backend, &camera, None, depth)?;
        accumulate(&mut totals, &stats);

        let passes = plan_passes(backend.commands());
        gpu_passes += passes.len();
        for draw in passes.iter().flat_map(|pass| &pass.draws) {
            let stencil = &draw.depth_stencil.stencil;
            pipeline_states.insert((
                stencil.front,
                stencil.write_mask,
                draw.depth_stencil.depth_write_enabled,
                draw.depth_stencil.depth_compare,
            ));
        }

        if level.settings().debug || frame % STATS_INTERVAL == 0 {
            debug!(
                "Frame {frame}: {} world renders, {} apertures, {} culled, {} passes",
                stats.world_renders,
                stats.aperture_draws,
                stats.culled_views,
                passes.len()
            );
        }
    }

    info!(
        "Demo finished after {frames} frames: {teleports} teleport(s), \
         {} world renders, {} culled views",
        totals.world_renders, totals.culled_views
    );
    info!(
        "{gpu_passes} render passes, {} distinct depth-stencil pipelines",
        pipeline_states.len()
    );
    Ok(teleports)
}

fn accumulate(totals: &mut RenderStats, stats: &RenderStats) {
    totals.sky_renders += stats.sky_renders;
    totals.world_renders += stats.world_renders;
    totals.aperture_draws += stats.aperture_draws;
    totals.rim_draws += stats.rim_draws;
    totals.marker_draws += stats.marker_draws;
    totals.culled_views += stats.culled_views;
    totals.depth_clears += stats.depth_clears;
}

#[cfg(test)]
mod tests {
    use super::{build_demo_level, run_demo};
    use crate::level::PortalSlot;
    use crate::settings::ClientSettings;

    #[test]
    fn demo_level_links_both_slots() {
        let level = build_demo_level(ClientSettings::default()).unwrap();
        let primary = level.slot(PortalSlot::Primary).expect("primary placed");
        let secondary = level.slot(PortalSlot::Secondary).expect("secondary placed");
        assert_eq!(level.arena().portal(primary).unwrap().linked(), Some(secondary));
    }

    #[test]
    fn demo_runs_through_the_primary_portal() {
        // Two seconds of walking covers the ten units to the far wall.
        let teleports = run_demo(ClientSettings::default(), 150).unwrap();
        assert_eq!(teleports, 1);
    }
}
