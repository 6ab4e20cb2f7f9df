//! agent-rpc - command-line client
//!
//! Connects to an agent, invokes one command, prints the reply and closes
//! the session.

use agent_rpc::{ClientConfig, CommandRegistry};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Client invocation parsed from the command line
struct Invocation {
    /// Connection settings
    config: ClientConfig,
    /// Command to invoke
    command: String,
    /// Positional arguments for the command
    args: Vec<String>,
}

/// What the command line asks for
enum Parsed {
    Run(Invocation),
    Help,
    Version,
}

impl Invocation {
    /// Parse the invocation from command-line arguments
    fn from_args() -> Self {
        let args: Vec<String> = std::env::args().skip(1).collect();

        match Self::parse(&args) {
            Ok(Parsed::Run(invocation)) => invocation,
            Ok(Parsed::Help) => {
                print_help();
                std::process::exit(0);
            }
            Ok(Parsed::Version) => {
                println!("agent-rpc version {}", agent_rpc::VERSION);
                std::process::exit(0);
            }
            Err(message) => {
                eprintln!("Error: {}", message);
                print_help();
                std::process::exit(1);
            }
        }
    }

    /// Options are only recognised before the command word; everything from
    /// the command on is passed through as its arguments.
    fn parse(args: &[String]) -> Result<Parsed, String> {
        let mut config = ClientConfig::default();
        let mut positional: Vec<String> = Vec::new();

        let mut i = 0;
        while i < args.len() {
            if !positional.is_empty() {
                positional.push(args[i].clone());
                i += 1;
                continue;
            }

            match args[i].as_str() {
                "--host" | "-h" => {
                    config.host = required_value(args, i, "--host")?.to_string();
                    i += 2;
                }
                "--port" | "-p" => {
                    config.port = required_value(args, i, "--port")?
                        .parse()
                        .map_err(|_| "invalid port number".to_string())?;
                    i += 2;
                }
                "--timeout" | "-t" => {
                    let secs: f64 = required_value(args, i, "--timeout")?
                        .parse()
                        .map_err(|_| "invalid timeout".to_string())?;
                    if !secs.is_finite() || secs <= 0.0 {
                        return Err("timeout must be a positive number of seconds".to_string());
                    }
                    config.recv_timeout = Duration::from_secs_f64(secs);
                    i += 2;
                }
                "--staging-dir" | "-s" => {
                    config.staging_root = PathBuf::from(required_value(args, i, "--staging-dir")?);
                    i += 2;
                }
                "--help" => return Ok(Parsed::Help),
                "--version" | "-v" => return Ok(Parsed::Version),
                arg if arg.starts_with('-') => {
                    return Err(format!("unknown argument: {}", arg));
                }
                _ => {
                    positional.push(args[i].clone());
                    i += 1;
                }
            }
        }

        if positional.is_empty() {
            return Err("no command given".to_string());
        }

        let command = positional.remove(0);
        Ok(Parsed::Run(Self {
            config,
            command,
            args: positional,
        }))
    }
}

fn required_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, String> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires a value", flag))
}

fn print_help() {
    println!(
        r#"
agent-rpc - Remote procedure calls to an inventory agent

USAGE:
    agent-rpc [OPTIONS] <COMMAND> [ARGS...]

OPTIONS:
    -h, --host <HOST>          Agent host (default: 127.0.0.1)
    -p, --port <PORT>          Agent port (default: 49153)
    -t, --timeout <SECONDS>    Receive timeout (default: 5)
    -s, --staging-dir <DIR>    Where received files are staged (default: system temp dir)
    -v, --version              Print version information
        --help                 Print this help message

COMMANDS:
    ping                       Check that the agent answers
    get_installed              List installed packages
    get_dependencies <PKG>     List the dependencies of a package
    get_file <PATH>            Copy a file from the agent host

EXAMPLES:
    agent-rpc -h 10.0.0.7 get_installed
    agent-rpc -h 10.0.0.7 get_file /var/lib/dpkg/status

Set RUST_LOG=debug for protocol-level logging.
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let invocation = Invocation::from_args();

    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let registry = CommandRegistry::connect_with(&invocation.config).await?;
    info!(peer = %registry.peer(), "Session open");

    let args: Vec<&str> = invocation.args.iter().map(String::as_str).collect();
    let result = registry.invoke(&invocation.command, &args).await;

    // Close even if the command failed, unless the stream is already unusable
    let fatal = matches!(&result, Err(e) if e.is_fatal());
    if !fatal {
        if let Err(e) = registry.close().await {
            error!("Failed to close session: {}", e);
        }
    }

    let reply = result?;
    if !reply.is_empty() {
        println!("{}", reply);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Parsed, String> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        Invocation::parse(&args)
    }

    fn run(args: &[&str]) -> Invocation {
        match parse(args) {
            Ok(Parsed::Run(invocation)) => invocation,
            _ => panic!("expected a runnable invocation for {:?}", args),
        }
    }

    #[test]
    fn test_options_before_command() {
        let invocation = run(&["-h", "10.0.0.7", "-p", "5000", "-t", "1.5", "get_installed"]);

        assert_eq!(invocation.config.host, "10.0.0.7");
        assert_eq!(invocation.config.port, 5000);
        assert_eq!(invocation.config.recv_timeout, Duration::from_millis(1500));
        assert_eq!(invocation.command, "get_installed");
        assert!(invocation.args.is_empty());
    }

    #[test]
    fn test_flags_after_command_are_arguments() {
        let invocation = run(&["get_dependencies", "-v"]);
        assert_eq!(invocation.command, "get_dependencies");
        assert_eq!(invocation.args, vec!["-v"]);

        let invocation = run(&["get_file", "--help", "-p", "1"]);
        assert_eq!(invocation.args, vec!["--help", "-p", "1"]);
        assert_eq!(invocation.config.port, agent_rpc::DEFAULT_PORT);
    }

    #[test]
    fn test_help_and_version() {
        assert!(matches!(parse(&["--help"]), Ok(Parsed::Help)));
        assert!(matches!(parse(&["-v", "ping"]), Ok(Parsed::Version)));
    }

    #[test]
    fn test_rejected_command_lines() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["--bogus", "ping"]).is_err());
        assert!(parse(&["-p"]).is_err());
        assert!(parse(&["-p", "notaport", "ping"]).is_err());
        assert!(parse(&["-t", "0", "ping"]).is_err());
    }
}
