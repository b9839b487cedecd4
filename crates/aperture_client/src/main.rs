fn main() {
    aperture_client::app::run();
}
