fn main() {
    std::process::exit(bleradar::app::startup::startup());
}
