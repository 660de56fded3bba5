fn main() {
    if let Err(err) = rutar_find::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
