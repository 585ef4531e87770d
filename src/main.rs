fn main() {
    if let Err(err) = invoice_sieve::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
