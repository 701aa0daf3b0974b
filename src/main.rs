fn main() {
    if let Err(err) = geo_layers_renderer::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
