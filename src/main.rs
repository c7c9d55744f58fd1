use std::process;

fn main() {
    if let Err(e) = relaydb::cli::run() {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}
