fn main() {
    if let Err(err) = csv_records::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
