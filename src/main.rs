fn main() {
    if let Err(err) = rental_ledger::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
