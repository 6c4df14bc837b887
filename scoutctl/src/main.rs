use clap::Parser;

fn main() {
    let cli = scoutctl::Cli::parse();
    if let Err(err) = scoutctl::run(cli) {
        eprintln!("erro: {err}");
        std::process::exit(1);
    }
}
