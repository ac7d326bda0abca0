//! Command-line parsing
//!
//! ```text
//! setu-io [--config <path>] --channel --serial <path> [baud]
//! setu-io [--config <path>] --channel --udp <host> <port>
//! ```

use crate::error::{Error, Result, exit_code};
use crate::transport::TransportSelector;

/// What the process was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(Invocation),
    Help,
}

impl Command {
    /// Status for commands that finish without starting the relay
    pub fn early_exit(&self) -> Option<i32> {
        match self {
            Command::Help => Some(exit_code::SUCCESS),
            Command::Run(_) => None,
        }
    }
}

/// Parsed run request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// TOML configuration file; defaults apply when absent
    pub config_path: Option<String>,
    pub selector: TransportSelector,
}

/// Parse `args` (including the program name at index 0)
pub fn parse_args(args: &[String]) -> Result<Command> {
    let mut config_path = None;
    let mut selector = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => return Ok(Command::Help),
            "--config" | "-c" => {
                i += 1;
                let path = args
                    .get(i)
                    .ok_or_else(|| usage_error("Missing value for --config"))?;
                config_path = Some(path.clone());
            }
            "--channel" => {
                if selector.is_some() {
                    return Err(usage_error("--channel given more than once"));
                }
                let (parsed, consumed) = parse_channel(&args[i + 1..])?;
                selector = Some(parsed);
                i += consumed;
            }
            other => return Err(usage_error(&format!("Unknown argument: {}", other))),
        }
        i += 1;
    }

    let selector = selector.ok_or_else(|| usage_error("Missing --channel argument"))?;
    Ok(Command::Run(Invocation {
        config_path,
        selector,
    }))
}

/// Parse the words after `--channel`; returns the selector and the number of words used
fn parse_channel(rest: &[String]) -> Result<(TransportSelector, usize)> {
    let kind = rest
        .first()
        .ok_or_else(|| usage_error("Missing channel type after --channel"))?;

    match kind.as_str() {
        "--serial" | "-s" => {
            let path = rest
                .get(1)
                .filter(|p| !p.starts_with('-'))
                .ok_or_else(|| usage_error("Missing serial port path"))?;
            match rest.get(2).filter(|b| !b.starts_with('-')) {
                Some(baud) => {
                    let baud = parse_number::<u32>(baud, "baud rate")?;
                    if baud == 0 {
                        return Err(usage_error("Baud rate must be non-zero"));
                    }
                    Ok((
                        TransportSelector::Serial {
                            path: path.clone(),
                            baud: Some(baud),
                        },
                        3,
                    ))
                }
                None => Ok((
                    TransportSelector::Serial {
                        path: path.clone(),
                        baud: None,
                    },
                    2,
                )),
            }
        }
        "--udp" | "-u" => {
            let host = rest
                .get(1)
                .filter(|h| !h.starts_with('-'))
                .ok_or_else(|| usage_error("Missing sensor host"))?;
            let port = rest
                .get(2)
                .ok_or_else(|| usage_error("Missing sensor port"))?;
            let port = parse_number::<u16>(port, "port")?;
            if port == 0 {
                return Err(usage_error("Port must be non-zero"));
            }
            Ok((
                TransportSelector::Network {
                    host: host.clone(),
                    port,
                },
                3,
            ))
        }
        other => Err(usage_error(&format!(
            "Invalid channel type: {} (use --serial or --udp)",
            other
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, what: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| usage_error(&format!("Invalid {}: {}", what, value)))
}

fn usage_error(message: &str) -> Error {
    Error::Usage(message.to_string())
}

/// Usage text
pub fn usage(program: &str) -> String {
    format!(
        r#"
Usage:
    {0} [--config <PATH>] --channel --serial <PORT> [BAUD]
    {0} [--config <PATH>] --channel --udp <HOST> <PORT>

Relay lidar scans as JSON datagrams over UDP.

OPTIONS:
    -c, --config <PATH>        TOML configuration file
    --channel -s <PORT> [BAUD] Serial link; without BAUD the configured rates are tried
    --channel -u <HOST> <PORT> Network-attached lidar
    -h, --help                 Show this help message

EXAMPLES:
    # Serial lidar, trying 115200 then 256000 baud
    {0} --channel --serial /dev/ttyUSB0

    # Serial lidar at a fixed rate with a custom destination
    {0} --config relay.toml --channel --serial /dev/ttyUSB0 256000

    # Network lidar
    {0} --channel --udp 192.168.11.2 8089
"#,
        program
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        std::iter::once("setu-io")
            .chain(line.split_whitespace())
            .map(String::from)
            .collect()
    }

    fn run(line: &str) -> Invocation {
        match parse_args(&args(line)).unwrap() {
            Command::Run(invocation) => invocation,
            Command::Help => panic!("unexpected help"),
        }
    }

    #[test]
    fn test_serial_without_baud() {
        let invocation = run("--channel --serial /dev/ttyUSB0");
        assert_eq!(
            invocation.selector,
            TransportSelector::Serial {
                path: "/dev/ttyUSB0".to_string(),
                baud: None
            }
        );
        assert_eq!(invocation.config_path, None);
    }

    #[test]
    fn test_serial_with_baud_and_config() {
        let invocation = run("-c relay.toml --channel -s /dev/ttyUSB0 256000");
        assert_eq!(invocation.config_path.as_deref(), Some("relay.toml"));
        assert_eq!(
            invocation.selector,
            TransportSelector::Serial {
                path: "/dev/ttyUSB0".to_string(),
                baud: Some(256000)
            }
        );
    }

    #[test]
    fn test_config_after_channel() {
        let invocation = run("--channel --serial /dev/ttyUSB0 --config relay.toml");
        assert_eq!(invocation.config_path.as_deref(), Some("relay.toml"));
        assert!(matches!(
            invocation.selector,
            TransportSelector::Serial { baud: None, .. }
        ));
    }

    #[test]
    fn test_udp_channel() {
        let invocation = run("--channel --udp 192.168.11.2 8089");
        assert_eq!(
            invocation.selector,
            TransportSelector::Network {
                host: "192.168.11.2".to_string(),
                port: 8089
            }
        );
    }

    #[test]
    fn test_help() {
        let help = parse_args(&args("--help")).unwrap();
        assert_eq!(help, Command::Help);
        assert_eq!(help.early_exit(), Some(exit_code::SUCCESS));
        assert!(
            parse_args(&args("--channel -u 192.168.11.2 8089"))
                .unwrap()
                .early_exit()
                .is_none()
        );
        assert_eq!(
            parse_args(&args("--channel -s /dev/ttyUSB0 -h")).unwrap(),
            Command::Help
        );
    }

    #[test]
    fn test_usage_errors() {
        for line in [
            "",
            "--channel",
            "--channel --serial",
            "--channel --serial /dev/ttyUSB0 fast",
            "--channel --serial /dev/ttyUSB0 0",
            "--channel --udp 192.168.11.2",
            "--channel --udp 192.168.11.2 0",
            "--channel --udp 192.168.11.2 70000",
            "--channel --tcp host 1",
            "--config",
            "--verbose",
            "--channel -s /dev/ttyUSB0 --channel -s /dev/ttyUSB1",
        ] {
            let err = parse_args(&args(line)).unwrap_err();
            assert!(matches!(err, Error::Usage(_)), "line {:?}", line);
        }
    }

    #[test]
    fn test_usage_mentions_program() {
        let text = usage("setu-io");
        assert!(text.contains("setu-io --channel --serial /dev/ttyUSB0"));
        assert!(text.contains("--udp <HOST> <PORT>"));
    }
}
