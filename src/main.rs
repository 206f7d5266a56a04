mod aggregate;
mod cli;
mod constants;
mod domain;
mod export;
mod ingest;
mod period;
mod storage;

fn main() {
    cli::run_cli();
}
