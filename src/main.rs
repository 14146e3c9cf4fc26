use std::{path::PathBuf, process::ExitCode};

use aidars::{
    Arguments, ChannelProvider, Layout, Payload, ServiceBuilder,
    channels::ChannelRegistry,
    get_default_log_level,
    providers::{
        BuffAcqProvider, KlystronProvider, MasterOscillatorProvider,
        sim::{SimulatedBuffAcq, SimulatedKlystrons, SimulatedMasterOscillator},
    },
};
use clap::{Parser, ValueEnum};
use serde_json::json;
use tracing::{debug, error, level_filters::LevelFilter};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Provider {
    Klystron,
    Buffacq,
    Mosc,
}

impl Provider {
    fn channels(&self) -> &'static str {
        match self {
            Self::Klystron => include_str!("../channels/klystron.toml"),
            Self::Buffacq => include_str!("../channels/buffacq.toml"),
            Self::Mosc => include_str!("../channels/mosc.toml"),
        }
    }
}

/// Run one AIDA-PVA request against a simulated provider
#[derive(Parser)]
struct Options {
    /// Which provider serves the request
    #[clap(long, value_enum, default_value = "klystron")]
    provider: Provider,
    /// Channel file to use instead of the provider's own
    #[clap(long)]
    channels: Option<PathBuf>,
    /// Channel to request
    #[clap(required = true, id = "CHANNEL")]
    channel: String,
    /// Request arguments, as NAME=VALUE. Give VALUE=... to make a set request
    #[clap(short = 'a', long = "arg", value_parser = parse_argument)]
    arguments: Vec<(String, String)>,
    /// Show debug output
    #[clap(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_argument(text: &str) -> Result<(String, String), String> {
    text.split_once('=')
        .map(|(name, value)| (name.trim().to_string(), value.to_string()))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| format!("Expected NAME=VALUE, got '{text}'"))
}

fn to_json(payload: &Payload, layout: Option<Layout>) -> serde_json::Value {
    match payload {
        Payload::Void => json!(null),
        Payload::Scalar(scalar) => scalar.to_json(),
        Payload::Array(array) => array.iter().map(|s| s.to_json()).collect(),
        Payload::Table(table) => table
            .cells(layout.unwrap_or(Layout::ColumnMajor))
            .iter()
            .map(|line| line.iter().map(|s| s.to_json()).collect::<serde_json::Value>())
            .collect(),
    }
}

fn run<P: ChannelProvider>(provider: P, registry: ChannelRegistry, opts: &Options) -> ExitCode {
    let Ok(mut service) = ServiceBuilder::new(provider).channels(registry).start() else {
        return ExitCode::FAILURE;
    };
    let arguments: Arguments = opts.arguments.iter().cloned().collect();
    match service.request(&opts.channel, &arguments) {
        Ok(payload) => {
            println!("{:#}", to_json(&payload, service.layout(&opts.channel)));
            ExitCode::SUCCESS
        }
        Err(fault) => {
            debug!("Empty response: {:?}", fault.empty);
            println!("{fault}");
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let opts = Options::parse();

    tracing_subscriber::fmt()
        .with_max_level(match opts.verbose {
            0 => get_default_log_level(),
            1 => LevelFilter::DEBUG,
            2.. => LevelFilter::TRACE,
        })
        .init();

    let registry = match &opts.channels {
        Some(path) => ChannelRegistry::load(path),
        None if std::env::var_os("AIDA_PVA_CHANNELS_FILENAME").is_some() => {
            ChannelRegistry::load_default()
        }
        None => ChannelRegistry::from_toml(opts.provider.channels()),
    };
    let registry = match registry {
        Ok(registry) => registry,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match opts.provider {
        Provider::Klystron => run(
            KlystronProvider::new(SimulatedKlystrons::sector()),
            registry,
            &opts,
        ),
        Provider::Buffacq => run(
            BuffAcqProvider::new(SimulatedBuffAcq::new(&[
                "BPMS:LI02:201",
                "BPMS:LI02:501",
                "BPMS:DR12:334",
                "BPMS:LI11:333",
            ])),
            registry,
            &opts,
        ),
        Provider::Mosc => run(
            MasterOscillatorProvider::new(SimulatedMasterOscillator::new(476.0)),
            registry,
            &opts,
        ),
    }
}
