use std::process::exit;

fn main() {
  if let Err(err) = chunkcast_cli::run() {
    eprintln!("Error: {:?}", err);
    exit(1);
  }
}
