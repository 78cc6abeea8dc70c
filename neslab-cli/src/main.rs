//! NESLAB Chiller Command-Line Tool
//!
//! Reads and writes ThermoFlex chiller settings over a serial port or a
//! serial-to-Ethernet adapter, and can serve a virtual chiller for testing.

mod settings;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use neslab_link::{connect_tcp, open_serial, Chiller, PortScanner, TransportKind};
use neslab_protocol::{Address, CommandSpec, Interface, Keystroke, OnOff, Params, Response};
use neslab_sim::{run_chiller_task, VirtualChiller, VirtualChillerCommand, VirtualChillerConfig};
use settings::Settings;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// NESLAB ThermoFlex chiller tool
#[derive(Parser, Debug)]
#[command(name = "neslab", version)]
#[command(about = "Talk to NESLAB ThermoFlex chillers over serial or TCP")]
struct Args {
    /// Serial port (e.g. /dev/ttyUSB0, COM3)
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// TCP address of a serial-to-Ethernet adapter or simulator
    #[arg(short, long, global = true)]
    tcp: Option<String>,

    /// Response timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Use the RS-485 lead byte
    #[arg(long, global = true)]
    rs485: bool,

    /// Device address, e.g. 1 or 0x0001
    #[arg(short, long, global = true, value_parser = parse_address)]
    address: Option<Address>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List serial ports
    Ports,

    /// Check that the chiller answers
    Ack,

    /// Send a request command and print the response
    Get {
        /// Catalog command name (e.g. req_temp1)
        command: String,
    },

    /// Write a value with a set command
    Set {
        /// Catalog command name (e.g. set_setp1)
        command: String,

        /// Value in engineering units, or the integer sent when --raw is given
        #[arg(allow_negative_numbers = true)]
        value: f64,

        /// Send the value unscaled
        #[arg(long)]
        raw: bool,
    },

    /// Print alarm and fault conditions
    Status,

    /// Press a front panel key
    Key {
        /// Key label (NULL, ENTER, UP_YES, DOWN_NO, ESC, ON/OFF, LEFT, RIGHT)
        keystroke: String,
    },

    /// Switch the unit on or off
    Power {
        #[arg(value_enum)]
        state: PowerState,
    },

    /// List every command the chiller understands
    Commands,

    /// Serve a virtual chiller on a TCP address
    Simulate {
        /// Listen address (defaults to the saved setting)
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Show the effective settings
    Config {
        /// Write the effective settings to the settings file
        #[arg(long)]
        save: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PowerState {
    On,
    Off,
    /// Only report whether the unit is running
    Query,
}

impl From<PowerState> for OnOff {
    fn from(state: PowerState) -> Self {
        match state {
            PowerState::On => OnOff::On,
            PowerState::Off => OnOff::Off,
            PowerState::Query => OnOff::NoChange,
        }
    }
}

fn parse_address(s: &str) -> Result<Address, String> {
    let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse::<u16>(),
    }
    .map_err(|e| format!("invalid address {:?}: {}", s, e))?;
    let [msb, lsb] = value.to_be_bytes();
    Ok(Address::new(msb, lsb))
}

impl Args {
    /// Overlay command-line flags on the saved settings
    fn apply(&self, settings: &mut Settings) {
        if let Some(port) = &self.port {
            settings.port = Some(port.clone());
            settings.tcp = None;
        }
        if let Some(tcp) = &self.tcp {
            settings.tcp = Some(tcp.clone());
        }
        if let Some(baud) = self.baud {
            settings.baud_rate = baud;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            settings.serial_timeout_ms = timeout_ms;
            settings.tcp_timeout_ms = timeout_ms;
        }
        if self.rs485 {
            settings.interface = Interface::MultiDrop;
        }
        if let Some(address) = self.address {
            settings.address = address;
            settings.simulator.address = address;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so results on stdout stay machine readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "neslab=info,neslab_protocol=info,neslab_link=info,neslab_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    if args.port.is_some() && args.tcp.is_some() {
        bail!("--port and --tcp cannot be used together");
    }

    let mut settings = Settings::load();
    args.apply(&mut settings);

    match args.command {
        Commands::Ports => list_ports(),
        Commands::Commands => {
            list_commands();
            Ok(())
        }
        Commands::Simulate { ref listen } => {
            let listen = listen.clone().unwrap_or_else(|| settings.listen.clone());
            simulate(&listen, settings.simulator.clone()).await
        }
        Commands::Config { save } => {
            if save {
                let path = settings.save()?;
                info!("Saved settings to {}", path.display());
            }
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
        ref command => connect_and_run(&settings, command, args.json).await,
    }
}

async fn connect_and_run(settings: &Settings, command: &Commands, json: bool) -> anyhow::Result<()> {
    if let Some(addr) = &settings.tcp {
        let stream = connect_tcp(addr).await?;
        let chiller = Chiller::new(stream, settings.link_config(TransportKind::Tcp));
        let result = run(&chiller, command, json).await;
        chiller.close().await?;
        return result;
    }

    if let Some(port) = &settings.port {
        let stream = open_serial(port, settings.baud_rate)?;
        let chiller = Chiller::new(stream, settings.link_config(TransportKind::Serial));
        let result = run(&chiller, command, json).await;
        chiller.close().await?;
        return result;
    }

    bail!("no chiller configured: pass --port or --tcp, or save one with `neslab config --save`")
}

async fn run<S>(chiller: &Chiller<S>, command: &Commands, json: bool) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    match command {
        Commands::Ack => {
            if !chiller.ack().await? {
                bail!("chiller answered with an unsupported protocol version");
            }
            println!("ok");
        }
        Commands::Get { command } => {
            let response = chiller.request(command, &Params::new()).await?;
            print_response(&response, json)?;
        }
        Commands::Set {
            command,
            value,
            raw,
        } => {
            let echoed = if *raw {
                if value.fract() != 0.0 || !(0.0..=u16::MAX as f64).contains(value) {
                    bail!("raw value must be an integer between 0 and {}", u16::MAX);
                }
                chiller.write_raw(command, *value as u16).await?
            } else {
                chiller.write_value(command, *value).await?
            };
            print_response(&Response::Analog(echoed), json)?;
        }
        Commands::Status => {
            let report = chiller.status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report);
            }
        }
        Commands::Key { keystroke } => {
            let key = Keystroke::from_name(keystroke).with_context(|| {
                let names: Vec<_> = Keystroke::ALL.iter().map(|k| k.name()).collect();
                format!("unknown key {:?}, expected one of {}", keystroke, names.join(", "))
            })?;
            chiller.press(key).await?;
            println!("pressed {}", key.name());
        }
        Commands::Power { state } => {
            let running = chiller.set_power((*state).into()).await?;
            println!("{}", if running { "running" } else { "off" });
        }
        other => bail!("{:?} does not use a chiller link", other),
    }
    Ok(())
}

fn print_response(response: &Response, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }
    match response {
        Response::Ack(ok) => println!("{}", if *ok { "ok" } else { "unsupported version" }),
        Response::Status(report) => println!("{}", report),
        Response::Analog(reading) => println!("{}", reading),
        Response::Raw(data) => println!("{:02X?}", data),
    }
    Ok(())
}

fn list_ports() -> anyhow::Result<()> {
    let ports = PortScanner::new().enumerate_ports()?;
    if ports.is_empty() {
        println!("no serial ports found");
    }
    for port in ports {
        println!("{}", port.describe());
    }
    Ok(())
}

fn list_commands() {
    for spec in CommandSpec::all() {
        let params: Vec<_> = spec.placeholders().collect();
        let params = if params.is_empty() {
            String::new()
        } else {
            format!(" [{}]", params.join(" "))
        };
        println!(
            "{:<22} 0x{:02X}  {}{}",
            spec.name,
            spec.code(),
            spec.description,
            params
        );
    }
}

/// Serve one client at a time, keeping the chiller's state between clients
async fn simulate(listen: &str, config: VirtualChillerConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to listen on {}", listen))?;
    info!("Serving {} on {}", config.id, listener.local_addr()?);

    let mut chiller = VirtualChiller::from_config(config);
    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = tokio::signal::ctrl_c() => {
                info!("Simulator stopped: {}", chiller.state_summary());
                return Ok(());
            }
        };
        stream.set_nodelay(true)?;
        info!("Client connected from {}", peer);

        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let mut session = tokio::spawn(run_chiller_task(stream, chiller, cmd_rx));
        tokio::select! {
            result = &mut session => {
                chiller = result??;
                info!("Client {} disconnected: {}", peer, chiller.state_summary());
            }
            _ = tokio::signal::ctrl_c() => {
                let _ = cmd_tx.send(VirtualChillerCommand::Shutdown).await;
                let chiller = session.await??;
                info!("Simulator stopped: {}", chiller.state_summary());
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("1"), Ok(Address::new(0x00, 0x01)));
        assert_eq!(parse_address("0x0102"), Ok(Address::new(0x01, 0x02)));
        assert!(parse_address("0x10000").is_err());
        assert!(parse_address("chiller").is_err());
    }

    #[test]
    fn test_parse_set_command() {
        let args =
            Args::try_parse_from(["neslab", "--tcp", "127.0.0.1:5000", "set", "set_setp1", "25.5"])
                .unwrap();
        match args.command {
            Commands::Set {
                command,
                value,
                raw,
            } => {
                assert_eq!(command, "set_setp1");
                assert_eq!(value, 25.5);
                assert!(!raw);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_flags_override_settings() {
        let args = Args::try_parse_from([
            "neslab",
            "status",
            "--port",
            "/dev/ttyS0",
            "--rs485",
            "--address",
            "0x0005",
            "--timeout-ms",
            "250",
        ])
        .unwrap();

        let mut settings = Settings {
            tcp: Some("10.0.0.7:4001".to_string()),
            ..Default::default()
        };
        args.apply(&mut settings);

        assert_eq!(settings.port.as_deref(), Some("/dev/ttyS0"));
        assert_eq!(settings.tcp, None);
        assert_eq!(settings.interface, Interface::MultiDrop);
        assert_eq!(settings.address, Address::new(0x00, 0x05));
        assert_eq!(
            settings.link_config(TransportKind::Serial).timeout,
            std::time::Duration::from_millis(250)
        );
    }

    #[test]
    fn test_power_state_mapping() {
        assert_eq!(OnOff::from(PowerState::On), OnOff::On);
        assert_eq!(OnOff::from(PowerState::Query), OnOff::NoChange);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn address_parses_in_decimal_and_hex(value in any::<u16>()) {
                let [msb, lsb] = value.to_be_bytes();
                let expected = Address::new(msb, lsb);
                prop_assert_eq!(parse_address(&value.to_string()), Ok(expected));
                prop_assert_eq!(parse_address(&format!("0x{:04X}", value)), Ok(expected));
                prop_assert_eq!(parse_address(&format!("0x{:x}", value)), Ok(expected));
            }
        }
    }
}
