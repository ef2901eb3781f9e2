use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use rs485_core::{
    is_standard_baud, list_ports, LineEnding, LinkConfig, RtsPolarity, TextEncoding,
    TransactError, STANDARD_BAUD_RATES,
};
use std::process::ExitCode;
use std::time::Duration;

mod console;

const EXIT_CONNECT_FAILED: u8 = 3;
const EXIT_TIMEOUT: u8 = 4;
const EXIT_IO_FAILURE: u8 = 5;

#[derive(Parser)]
#[command(name = "rs485", version, about = "Send text commands to an RS-485 device")]
struct Cli {
    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List available serial ports
    Ports,
    /// Send one command and print the reply
    Send {
        #[command(flatten)]
        link: LinkArgs,
        command: String,
    },
    /// Interactive session; every input line is sent as a command
    Console {
        #[command(flatten)]
        link: LinkArgs,
    },
}

#[derive(Args)]
struct LinkArgs {
    /// Serial port; defaults to the first one found
    #[arg(short, long, env = "RS485_PORT")]
    port: Option<String>,

    #[arg(short, long, env = "RS485_BAUD", default_value_t = 9600,
          value_parser = clap::value_parser!(u32).range(1..))]
    baud: u32,

    #[arg(long, default_value_t = 2000)]
    read_timeout_ms: u64,

    #[arg(long, default_value_t = 500)]
    write_timeout_ms: u64,

    /// Pause after enabling and before releasing the transmitter
    #[arg(long, default_value_t = 50)]
    settle_ms: u64,

    /// lf, cr or crlf
    #[arg(long, default_value = "lf")]
    line_ending: LineEnding,

    /// Transceiver transmits while RTS is low
    #[arg(long)]
    rts_active_low: bool,

    /// auto, utf8, utf16, ascii or gbk
    #[arg(long, default_value = "utf8")]
    encoding: TextEncoding,
}

impl LinkArgs {
    fn into_config(self) -> LinkConfig {
        let port_name = self
            .port
            .or_else(|| list_ports().into_iter().next().map(|p| p.port_name))
            .unwrap_or_default();
        if !is_standard_baud(self.baud) {
            log::warn!(
                "{} baud is not one of the standard rates {:?}",
                self.baud,
                STANDARD_BAUD_RATES
            );
        }
        LinkConfig {
            port_name,
            baud_rate: self.baud,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            settle_delay: Duration::from_millis(self.settle_ms),
            line_ending: self.line_ending,
            rts_polarity: if self.rts_active_low {
                RtsPolarity::ActiveLow
            } else {
                RtsPolarity::ActiveHigh
            },
            encoding: self.encoding,
        }
    }
}

fn init_logging(verbose: u8) {
    env_logger::Builder::new()
        .filter_level(match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        })
        .parse_default_env()
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Ports => {
            print_ports();
            Ok(ExitCode::SUCCESS)
        }
        Command::Send { link, command } => Ok(send_once(link.into_config(), &command)),
        Command::Console { link } => {
            console::run(link.into_config())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_ports() {
    let ports = list_ports();
    if ports.is_empty() {
        eprintln!("no serial ports found");
    }
    for port in ports {
        match &port.product {
            Some(product) => println!("{}  {} [{}]", port.label(), product, port.port_type),
            None => println!("{}  [{}]", port.label(), port.port_type),
        }
    }
}

fn send_once(cfg: LinkConfig, command: &str) -> ExitCode {
    let mut conn = match rs485_core::connect(cfg) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("error: failed to connect: {e}");
            return ExitCode::from(EXIT_CONNECT_FAILED);
        }
    };

    let result = conn.transact(command);
    conn.disconnect();

    match result {
        Ok(response) => {
            println!("{response}");
            ExitCode::SUCCESS
        }
        Err(e @ TransactError::Timeout(_)) => {
            eprintln!("error: {e}");
            ExitCode::from(EXIT_TIMEOUT)
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(EXIT_IO_FAILURE)
        }
    }
}
