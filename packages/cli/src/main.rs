use clap::Parser;
use sdmount_cli::Args;

fn main() {
    let args = Args::parse();
    sdmount_cli::init_logging(args.log_level());

    let code = match sdmount_cli::run(&args) {
        Ok(output) => {
            print!("{}", output);
            if args.json {
                println!();
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };

    if args.stay_resident {
        loop {
            std::thread::park();
        }
    }
    std::process::exit(code);
}
