fn main() {
    std::process::exit(heartdata_converter::cli::run());
}
