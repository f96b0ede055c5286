fn main() {
    if let Err(err) = dedup_bench::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
