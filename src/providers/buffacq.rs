//! Buffered BPM acquisition
//!
//! `request_table` on `<GROUP>:BUFFACQ` runs one buffered acquisition for the
//! device group and returns every reading taken. The BPMs to read are either
//! `bpms` or `devs`, never both; with neither the whole BPM device list
//! of the group is used.

use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::{
    arguments::Arguments,
    error::{AidaError, ExceptionKind, NativeStatus},
    providers::ChannelProvider,
    scanner::{FieldSpec, Scanner},
    table::{Table, TableBuilder},
    types::AidaType,
    uri::{self, Pmu},
    vms::VaxF,
};

const ATTRIBUTE: &str = "BUFFACQ";

/// One pulse of one BPM, as read from the acquisition buffer
#[derive(Debug, Clone, PartialEq)]
pub struct BpmReading {
    pub name: String,
    pub pulse_id: i32,
    pub x: VaxF,
    pub y: VaxF,
    pub tmit: VaxF,
    pub stat: i16,
    pub good_measurement: i16,
}

/// What to acquire
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionRequest<'a> {
    pub group: &'a str,
    pub bpmd: i32,
    pub nrpos: i32,
    /// Empty for every BPM in the group
    pub devices: &'a [Pmu],
}

/// The buffered acquisition library
///
/// Every successful `acquisition_init` is paired with exactly one
/// `terminate`, whatever happens in between.
pub trait BuffAcqLibrary: Send + 'static {
    fn init(&mut self) -> Result<(), NativeStatus>;

    fn acquisition_init(&mut self) -> Result<(), NativeStatus>;

    /// Take the readings, returning the number of rows acquired
    fn acquire(&mut self, request: &AcquisitionRequest) -> Result<usize, NativeStatus>;

    fn readings(&mut self, rows: usize) -> Result<Vec<BpmReading>, NativeStatus>;

    fn terminate(&mut self);
}

/// An acquisition in progress, terminated when dropped
struct Acquisition<'a, L: BuffAcqLibrary> {
    library: &'a mut L,
}

impl<'a, L: BuffAcqLibrary> Acquisition<'a, L> {
    fn start(library: &'a mut L) -> Result<Self, AidaError> {
        library.acquisition_init().map_err(|status| {
            AidaError::with_status(
                ExceptionKind::UnableToGetData,
                status,
                Some("Unable to initialise buffered acquisition"),
            )
        })?;
        Ok(Self { library })
    }
}

impl<L: BuffAcqLibrary> Drop for Acquisition<'_, L> {
    fn drop(&mut self) {
        debug!("Terminating buffered acquisition");
        self.library.terminate();
    }
}

pub struct BuffAcqProvider<L: BuffAcqLibrary> {
    library: Mutex<L>,
}

impl<L: BuffAcqLibrary> BuffAcqProvider<L> {
    pub fn new(library: L) -> Self {
        Self {
            library: Mutex::new(library),
        }
    }

    pub fn into_library(self) -> L {
        self.library
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn devices(arguments: &Arguments) -> Result<Vec<Pmu>, AidaError> {
        let scanned = Scanner::new(arguments).scan(&[
            FieldSpec::optional("bpms", AidaType::StringArray),
            FieldSpec::optional("devs", AidaType::StringArray),
        ])?;
        let bpms: Vec<String> = scanned.get("bpms")?;
        let devs: Vec<String> = scanned.get("devs")?;
        if !bpms.is_empty() && !devs.is_empty() {
            return Err(AidaError::unable_to_get(
                "Specify either DEVS or BPMS argument but not both",
            ));
        }
        let names = if bpms.is_empty() { devs } else { bpms };
        names.iter().map(|name| name.parse()).collect()
    }
}

impl<L: BuffAcqLibrary> ChannelProvider for BuffAcqProvider<L> {
    fn service_init(&mut self) -> Result<(), AidaError> {
        self.library
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .init()
            .map_err(|status| {
                AidaError::with_status(
                    ExceptionKind::ServerInitialisation,
                    status,
                    Some("initialising Buffered Acquisition Service"),
                )
            })
    }

    fn request_table(&self, uri: &str, arguments: &Arguments) -> Result<Table, AidaError> {
        if !uri::has_attribute(uri, ATTRIBUTE) {
            return Err(AidaError::unsupported_channel(uri));
        }
        let scanned = Scanner::new(arguments).scan(&[
            FieldSpec::required("bpmd", AidaType::Integer),
            FieldSpec::optional("nrpos", AidaType::Integer).or(1),
        ])?;
        let devices = Self::devices(arguments)?;
        let request = AcquisitionRequest {
            group: uri::device_name(uri),
            bpmd: scanned.get("bpmd")?,
            nrpos: scanned.get("nrpos")?,
            devices: &devices,
        };

        let mut library = self
            .library
            .lock()
            .map_err(|_| AidaError::internal("Buffered acquisition library is unusable"))?;
        let acquisition = Acquisition::start(&mut *library)?;
        debug!(
            "Acquiring {} pulses of {} BPMs in {} with BPMD {}",
            request.nrpos,
            request.devices.len(),
            request.group,
            request.bpmd
        );
        let rows = acquisition.library.acquire(&request).map_err(|status| {
            AidaError::with_status(
                ExceptionKind::UnableToGetData,
                status,
                Some("Unable to acquire BPM data"),
            )
        })?;
        if rows == 0 {
            return Err(AidaError::unable_to_get("No BPM readings were acquired"));
        }
        let readings = acquisition.library.readings(rows).map_err(|status| {
            AidaError::with_status(
                ExceptionKind::UnableToGetData,
                status,
                Some("Unable to read BPM data"),
            )
        })?;
        drop(acquisition);

        let column = |f: fn(&BpmReading) -> f32| -> Vec<f32> { readings.iter().map(f).collect() };
        Ok(TableBuilder::new(readings.len(), 7)?
            .add_column(readings.iter().map(|r| r.name.clone()).collect::<Vec<_>>())?
            .add_column(readings.iter().map(|r| r.pulse_id).collect::<Vec<_>>())?
            .add_column(column(|r| r.x.to_f32()))?
            .add_column(column(|r| r.y.to_f32()))?
            .add_column(column(|r| r.tmit.to_f32()))?
            .add_column(readings.iter().map(|r| r.stat).collect::<Vec<_>>())?
            .add_column(readings.iter().map(|r| r.good_measurement).collect::<Vec<_>>())?
            .build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{providers::sim::SimulatedBuffAcq, value::Array};

    fn provider(library: SimulatedBuffAcq) -> BuffAcqProvider<SimulatedBuffAcq> {
        let _ = tracing_subscriber::fmt()
            .with_writer(tracing_subscriber::fmt::TestWriter::new())
            .try_init();
        BuffAcqProvider::new(library)
    }

    fn bpms() -> SimulatedBuffAcq {
        SimulatedBuffAcq::new(&["BPMS:LI02:201", "BPMS:LI02:501", "BPMS:DR12:334"])
    }

    #[test]
    fn acquire_selected_bpms() {
        let provider = provider(bpms());
        let arguments = Arguments::new()
            .with("BPMD", "57")
            .with("NRPOS", "2")
            .with("BPMS", r#"["BPMS:LI02:501", "BPMS:DR12:334"]"#);
        let table = provider.request_table("NDRFACET:BUFFACQ", &arguments).unwrap();
        assert_eq!(table.row_count(), 4);
        assert_eq!(table.column_count(), 7);
        assert_eq!(table.column(0).map(Array::get_type), Some(AidaType::StringArray));
        assert_eq!(table.column(1).map(Array::get_type), Some(AidaType::IntegerArray));
        assert_eq!(table.column(4).map(Array::get_type), Some(AidaType::FloatArray));
        assert_eq!(table.column(6).map(Array::get_type), Some(AidaType::ShortArray));

        let library = provider.into_library();
        assert_eq!(library.last_group(), Some("NDRFACET"));
        assert_eq!(library.terminations(), 1);
    }

    #[test]
    fn whole_group_by_default() {
        let table = provider(bpms())
            .request_table("NDRFACET:BUFFACQ", &Arguments::new().with("BPMD", "57"))
            .unwrap();
        assert_eq!(table.row_count(), 3);
    }

    #[test]
    fn bpms_and_devs_are_exclusive() {
        let provider = provider(bpms());
        let arguments = Arguments::new()
            .with("BPMD", "57")
            .with("BPMS", r#"["BPMS:LI02:501"]"#)
            .with("DEVS", r#"["BPMS:DR12:334"]"#);
        let err = provider.request_table("NDRFACET:BUFFACQ", &arguments).unwrap_err();
        assert_eq!(err.kind(), ExceptionKind::UnableToGetData);
        assert!(err.to_string().contains("not both"));
        // Refused before anything was started
        assert_eq!(provider.into_library().acquisitions(), 0);
    }

    #[test]
    fn terminated_after_failure() {
        let provider = provider(bpms().with_failing_reads());
        let err = provider
            .request_table("NDRFACET:BUFFACQ", &Arguments::new().with("BPMD", "57"))
            .unwrap_err();
        assert_eq!(err.kind(), ExceptionKind::UnableToGetData);
        assert!(err.status().is_some());
        let library = provider.into_library();
        assert_eq!(library.acquisitions(), 1);
        assert_eq!(library.terminations(), 1);
    }

    #[test]
    fn argument_errors() {
        let provider = provider(bpms());
        let err = provider
            .request_table("NDRFACET:BUFFACQ", &Arguments::new())
            .unwrap_err();
        assert_eq!(err.kind(), ExceptionKind::MissingRequiredArgument);
        let err = provider
            .request_table(
                "NDRFACET:BUFFACQ",
                &Arguments::new().with("BPMD", "57").with("DEVS", r#"["BPMS:LI02"]"#),
            )
            .unwrap_err();
        assert_eq!(err.message(), Some("Invalid device name: BPMS:LI02"));
        let err = provider
            .request_table("NDRFACET:BPMS", &Arguments::new().with("BPMD", "57"))
            .unwrap_err();
        assert_eq!(err.kind(), ExceptionKind::UnsupportedChannel);
    }
}
