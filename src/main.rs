const HELP: &str = "comment-section: read an entity's comment feed from the terminal.

Usage:
  comment-section feed <entity-id> [--sort top|new|old]

Options:
  --version, -V        Show version and exit
  --help,    -h        Show this help message

Configuration is read from ~/.config/comment-section/config.yaml and
COMMENT_SECTION_* environment variables.";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if handle_cli_flags(&args) {
        return;
    }

    let command = match comment_section::parse_args(&args) {
        Ok(Some(command)) => command,
        Ok(None) => {
            println!("{HELP}");
            return;
        }
        Err(err) => {
            eprintln!("error: {err}\n\n{HELP}");
            std::process::exit(2);
        }
    };

    if let Err(err) = comment_section::run(command) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn handle_cli_flags(args: &[String]) -> bool {
    let mut saw_flag = false;
    for arg in args {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("comment-section {}", comment_section::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!("{HELP}");
                saw_flag = true;
            }
            _ => {}
        }
    }
    saw_flag
}
