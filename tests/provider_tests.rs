use std::io::Write;

use aidars::{
    AidaService, Arguments, ChannelProvider, ExceptionKind, Layout, Payload, ServiceBuilder,
    channels::ChannelRegistry,
    providers::{
        BuffAcqProvider, KlystronProvider, MasterOscillatorProvider,
        sim::{SimulatedBuffAcq, SimulatedKlystrons, SimulatedMasterOscillator},
    },
    table::Table,
    value::{Array, Scalar},
};
use tracing_subscriber::fmt::TestWriter;

/// Start a service for a provider, serving one of the bundled channel files
pub fn start_service<P: ChannelProvider>(provider: P, channels: &str) -> AidaService<P> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::level_filters::LevelFilter::DEBUG)
        .with_writer(TestWriter::new())
        .try_init();
    ServiceBuilder::new(provider)
        .channels(ChannelRegistry::from_toml(channels).unwrap())
        .start()
        .unwrap()
}

fn klystrons() -> AidaService<KlystronProvider<SimulatedKlystrons>> {
    start_service(
        KlystronProvider::new(SimulatedKlystrons::sector()),
        include_str!("../channels/klystron.toml"),
    )
}

fn table(payload: Payload) -> Table {
    match payload {
        Payload::Table(table) => table,
        other => panic!("Expected a table, got {other:?}"),
    }
}

#[test]
fn klystron_status() {
    let mut service = klystrons();
    let status = service
        .request(
            "KLYS:LI31:31:TACT",
            &Arguments::new().with("TYPE", "SHORT").with("BEAM", "1"),
        )
        .unwrap();
    assert_eq!(status, Payload::Scalar(Scalar::Short(0x21)));

    // Legacy names and a service prefix are both accepted
    let status = service
        .request(
            "SLC::KLYS:LI31:51//TACT",
            &Arguments::new()
                .with("TYPE", "LONG")
                .with("BEAM", "1")
                .with("DGRP", "DEV_DGRP"),
        )
        .unwrap();
    assert_eq!(status, Payload::Scalar(Scalar::Long(0x02)));

    let fault = service
        .request("KLYS:LI31:31:TACT", &Arguments::new().with("TYPE", "STRING"))
        .unwrap_err();
    assert_eq!(fault.kind(), ExceptionKind::MissingRequiredArgument);
    assert_eq!(fault.empty, Payload::Scalar(Scalar::String(String::new())));

    let fault = service
        .request(
            "KLYS:LI31:31:TACT",
            &Arguments::new().with("TYPE", "FLOAT").with("BEAM", "1"),
        )
        .unwrap_err();
    assert_eq!(fault.kind(), ExceptionKind::UnsupportedChannel);
    assert_eq!(fault.empty, Payload::Scalar(Scalar::Float(0.0)));
}

#[test]
fn klystron_bulk_status() {
    let mut service = klystrons();
    let arguments = Arguments::new()
        .with("BEAM", "1")
        .with("DEVICES", r#"["KLYS:LI31:31", "KLYS:LI31:99", "KLYS:LI31:61"]"#);
    let status = table(service.request("KLYSTRONGET:TACT", &arguments).unwrap());
    assert_eq!(status.row_count(), 3);
    assert_eq!(status.column_count(), 10);
    assert_eq!(
        status.row(1),
        Some(vec![
            Scalar::String("KLYS:LI31:99".into()),
            Scalar::Boolean(false),
            Scalar::Short(0),
            Scalar::Boolean(false),
            Scalar::Boolean(false),
            Scalar::Boolean(false),
            Scalar::Boolean(false),
            Scalar::Boolean(false),
            Scalar::Boolean(false),
            Scalar::Boolean(false),
        ])
    );
    // standby, bad
    assert_eq!(status.column(4), Some(&Array::Boolean(vec![false, false, true])));
    assert_eq!(status.column(5), Some(&Array::Boolean(vec![false, false, true])));

    let fault = service
        .request(
            "KLYSTRONGET:TACT",
            &Arguments::new()
                .with("BEAM", "1")
                .with("DEVICES", r#"["KLYS:LI31:98", "KLYS:LI31:99"]"#),
        )
        .unwrap_err();
    assert_eq!(fault.kind(), ExceptionKind::UnableToGetData);
    assert_eq!(fault.empty, Payload::Table(Table::empty()));
}

#[test]
fn klystron_sets() {
    let mut service = klystrons();
    let status = table(
        service
            .request(
                "KLYS:LI31:51:TACT",
                &Arguments::new().with("VALUE", "1").with("BEAM", "1"),
            )
            .unwrap(),
    );
    assert_eq!(status.column(0), Some(&Array::Short(vec![0x01])));

    let fault = service
        .request(
            "KLYS:LI31:51:TACT",
            &Arguments::new().with("VALUE", "1").with("BEAM", "1"),
        )
        .unwrap_err();
    assert_eq!(fault.kind(), ExceptionKind::UnableToSetData);

    let phase = table(
        service
            .request(
                "KLYS:LI31:31:PDES",
                &Arguments::new().with("VALUE", "90.0").with("TRIM", "false"),
            )
            .unwrap(),
    );
    assert_eq!(phase.column(0), Some(&Array::Float(vec![90.0])));
    assert_eq!(service.provider().library().last_trim(), Some("NO".into()));

    let fault = service
        .request(
            "KLYS:LI31:31:KPHR",
            &Arguments::new().with("VALUE", "90.0").with("TRIM", "false"),
        )
        .unwrap_err();
    assert_eq!(fault.kind(), ExceptionKind::UnsupportedChannel);

    let result = service
        .request("KLYS:LI31:31:PCON", &Arguments::new().with("VALUE", "5.0"))
        .unwrap();
    assert_eq!(result, Payload::Void);
    assert_eq!(
        service.provider().library().config("KLYS:LI31:31", "PCON"),
        Some(5.0)
    );
}

#[test]
fn buffered_acquisition() {
    let mut service = start_service(
        BuffAcqProvider::new(SimulatedBuffAcq::new(&[
            "BPMS:LI02:201",
            "BPMS:LI02:501",
            "BPMS:DR12:334",
        ])),
        include_str!("../channels/buffacq.toml"),
    );
    let readings = table(
        service
            .request(
                "NDRFACET:BUFFACQ",
                &Arguments::new().with("BPMD", "57").with("NRPOS", "2"),
            )
            .unwrap(),
    );
    assert_eq!(readings.row_count(), 6);
    assert_eq!(readings.column(1), Some(&Array::Integer(vec![0, 0, 0, 1, 1, 1])));
    assert_eq!(service.layout("NDRFACET:BUFFACQ"), Some(Layout::ColumnMajor));

    let fault = service
        .request(
            "NDRFACET:BUFFACQ",
            &Arguments::new()
                .with("BPMD", "57")
                .with("BPMS", r#"["BPMS:LI02:201"]"#)
                .with("DEVS", r#"["BPMS:LI02:501"]"#),
        )
        .unwrap_err();
    assert_eq!(fault.kind(), ExceptionKind::UnableToGetData);

    let library = service.into_provider().into_library();
    assert_eq!(library.acquisitions(), library.terminations());
}

#[test]
fn master_oscillator() {
    let mut service = start_service(
        MasterOscillatorProvider::new(SimulatedMasterOscillator::new(476.0)),
        include_str!("../channels/mosc.toml"),
    );
    assert_eq!(
        service
            .request("MASTEROSC:VAL", &Arguments::new().with("TYPE", "DOUBLE"))
            .unwrap(),
        Payload::Scalar(Scalar::Double(476.0))
    );
    let frequency = table(
        service
            .request("MASTEROSC:VAL", &Arguments::new().with("TYPE", "TABLE"))
            .unwrap(),
    );
    assert_eq!(frequency.column(0), Some(&Array::Double(vec![476.0])));

    let frequency = table(
        service
            .request("MASTEROSC:VAL", &Arguments::new().with("VALUE", "0.5"))
            .unwrap(),
    );
    assert_eq!(frequency.column(0), Some(&Array::Double(vec![476.5])));

    let fault = service
        .request(
            "MASTEROSC:VAL",
            &Arguments::new().with("VALUE", "1").with("UNITS", "ENERGY"),
        )
        .unwrap_err();
    assert_eq!(fault.kind(), ExceptionKind::MissingRequiredArgument);
}

#[test]
fn channel_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(include_str!("../channels/mosc.toml").as_bytes())
        .unwrap();
    let registry = ChannelRegistry::load(file.path()).unwrap();
    assert_eq!(registry.name(), "SLC Master Oscillator");
    let service = ServiceBuilder::new(MasterOscillatorProvider::new(
        SimulatedMasterOscillator::new(476.0),
    ))
    .channels(registry)
    .start()
    .unwrap();
    let getter = service.channel_config("MASTEROSC:VAL", true);
    assert_eq!(getter.fields[0].units.as_deref(), Some("MHz"));
    assert!(service.channel_config("MASTEROSC:VAL", false).accepts_argument("ring"));
}
