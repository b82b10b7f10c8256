fn main() {
    if let Err(err) = flowmeta_renderer::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
