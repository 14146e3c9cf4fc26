//! Interface between the request router and the device backends

pub mod buffacq;
pub mod klystron;
pub mod mosc;
pub mod sim;

pub use buffacq::BuffAcqProvider;
pub use klystron::KlystronProvider;
pub use mosc::MasterOscillatorProvider;

use crate::{
    arguments::Arguments,
    error::{AidaError, NativeStatus},
    table::Table,
    types::{AidaType, Config},
    value::{Array, Scalar, Value},
};

/// Serves the channels of one AIDA-PVA service
///
/// There is one method per shape of result. A provider only implements the
/// shapes it supports: every method left at its default raises
/// `UnsupportedChannelException` naming the channel.
///
/// Getters take `&self` and setters `&mut self`. The service holds the
/// provider and serializes set requests, so providers need no locking of their
/// own unless a getter has to mutate device state.
pub trait ChannelProvider: Send + Sync + 'static {
    /// Called once when the service starts, before any request
    ///
    /// An error here stops the service from serving anything.
    fn service_init(&mut self) -> Result<(), AidaError> {
        Ok(())
    }

    /// Override the configured shape of a channel
    ///
    /// The default config changes nothing, and the channel file is used as-is.
    #[allow(unused_variables)]
    fn channel_config(&self, channel_name: &str, for_getter: bool) -> Config {
        Config::default()
    }

    #[allow(unused_variables)]
    fn request_boolean(&self, uri: &str, arguments: &Arguments) -> Result<bool, AidaError> {
        Err(AidaError::unsupported_channel(uri))
    }

    #[allow(unused_variables)]
    fn request_byte(&self, uri: &str, arguments: &Arguments) -> Result<i8, AidaError> {
        Err(AidaError::unsupported_channel(uri))
    }

    #[allow(unused_variables)]
    fn request_short(&self, uri: &str, arguments: &Arguments) -> Result<i16, AidaError> {
        Err(AidaError::unsupported_channel(uri))
    }

    #[allow(unused_variables)]
    fn request_integer(&self, uri: &str, arguments: &Arguments) -> Result<i32, AidaError> {
        Err(AidaError::unsupported_channel(uri))
    }

    #[allow(unused_variables)]
    fn request_long(&self, uri: &str, arguments: &Arguments) -> Result<i64, AidaError> {
        Err(AidaError::unsupported_channel(uri))
    }

    #[allow(unused_variables)]
    fn request_float(&self, uri: &str, arguments: &Arguments) -> Result<f32, AidaError> {
        Err(AidaError::unsupported_channel(uri))
    }

    #[allow(unused_variables)]
    fn request_double(&self, uri: &str, arguments: &Arguments) -> Result<f64, AidaError> {
        Err(AidaError::unsupported_channel(uri))
    }

    #[allow(unused_variables)]
    fn request_string(&self, uri: &str, arguments: &Arguments) -> Result<String, AidaError> {
        Err(AidaError::unsupported_channel(uri))
    }

    #[allow(unused_variables)]
    fn request_boolean_array(
        &self,
        uri: &str,
        arguments: &Arguments,
    ) -> Result<Vec<bool>, AidaError> {
        Err(AidaError::unsupported_channel(uri))
    }

    #[allow(unused_variables)]
    fn request_byte_array(&self, uri: &str, arguments: &Arguments) -> Result<Vec<i8>, AidaError> {
        Err(AidaError::unsupported_channel(uri))
    }

    #[allow(unused_variables)]
    fn request_short_array(
        &self,
        uri: &str,
        arguments: &Arguments,
    ) -> Result<Vec<i16>, AidaError> {
        Err(AidaError::unsupported_channel(uri))
    }

    #[allow(unused_variables)]
    fn request_integer_array(
        &self,
        uri: &str,
        arguments: &Arguments,
    ) -> Result<Vec<i32>, AidaError> {
        Err(AidaError::unsupported_channel(uri))
    }

    #[allow(unused_variables)]
    fn request_long_array(&self, uri: &str, arguments: &Arguments) -> Result<Vec<i64>, AidaError> {
        Err(AidaError::unsupported_channel(uri))
    }

    #[allow(unused_variables)]
    fn request_float_array(
        &self,
        uri: &str,
        arguments: &Arguments,
    ) -> Result<Vec<f32>, AidaError> {
        Err(AidaError::unsupported_channel(uri))
    }

    #[allow(unused_variables)]
    fn request_double_array(
        &self,
        uri: &str,
        arguments: &Arguments,
    ) -> Result<Vec<f64>, AidaError> {
        Err(AidaError::unsupported_channel(uri))
    }

    #[allow(unused_variables)]
    fn request_string_array(
        &self,
        uri: &str,
        arguments: &Arguments,
    ) -> Result<Vec<String>, AidaError> {
        Err(AidaError::unsupported_channel(uri))
    }

    #[allow(unused_variables)]
    fn request_table(&self, uri: &str, arguments: &Arguments) -> Result<Table, AidaError> {
        Err(AidaError::unsupported_channel(uri))
    }

    /// Set a value, with nothing returned
    #[allow(unused_variables)]
    fn set_value(
        &mut self,
        uri: &str,
        arguments: &Arguments,
        value: &Value,
    ) -> Result<(), AidaError> {
        Err(AidaError::unsupported_channel(uri))
    }

    /// Set a value, and return a table describing the result
    #[allow(unused_variables)]
    fn set_value_with_response(
        &mut self,
        uri: &str,
        arguments: &Arguments,
        value: &Value,
    ) -> Result<Table, AidaError> {
        Err(AidaError::unsupported_channel(uri))
    }
}

/// Call the scalar getter for a concrete scalar type
pub fn request_scalar<P: ChannelProvider + ?Sized>(
    provider: &P,
    uri: &str,
    arguments: &Arguments,
    ty: AidaType,
) -> Result<Scalar, AidaError> {
    Ok(match ty {
        AidaType::Boolean => provider.request_boolean(uri, arguments)?.into(),
        AidaType::Byte => provider.request_byte(uri, arguments)?.into(),
        AidaType::Short => provider.request_short(uri, arguments)?.into(),
        AidaType::Integer => provider.request_integer(uri, arguments)?.into(),
        AidaType::Long => provider.request_long(uri, arguments)?.into(),
        AidaType::Float => provider.request_float(uri, arguments)?.into(),
        AidaType::Double => provider.request_double(uri, arguments)?.into(),
        AidaType::String => provider.request_string(uri, arguments)?.into(),
        other => {
            return Err(AidaError::internal(format!(
                "{uri}: {other} is not a scalar type"
            )));
        }
    })
}

/// Call the array getter for a concrete array type
pub fn request_array<P: ChannelProvider + ?Sized>(
    provider: &P,
    uri: &str,
    arguments: &Arguments,
    ty: AidaType,
) -> Result<Array, AidaError> {
    Ok(match ty {
        AidaType::BooleanArray => provider.request_boolean_array(uri, arguments)?.into(),
        AidaType::ByteArray => provider.request_byte_array(uri, arguments)?.into(),
        AidaType::ShortArray => provider.request_short_array(uri, arguments)?.into(),
        AidaType::IntegerArray => provider.request_integer_array(uri, arguments)?.into(),
        AidaType::LongArray => provider.request_long_array(uri, arguments)?.into(),
        AidaType::FloatArray => provider.request_float_array(uri, arguments)?.into(),
        AidaType::DoubleArray => provider.request_double_array(uri, arguments)?.into(),
        AidaType::StringArray => provider.request_string_array(uri, arguments)?.into(),
        other => {
            return Err(AidaError::internal(format!(
                "{uri}: {other} is not an array type"
            )));
        }
    })
}

/// One device's outcome in a multi-device query
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceResult<T> {
    pub device: String,
    pub result: Result<T, NativeStatus>,
}

/// Query a list of devices independently, in order
///
/// A failing device is recorded rather than raised. Only when every device
/// fails, or there were none to ask, is the whole query an error.
pub fn query_devices<T>(
    devices: &[String],
    mut query: impl FnMut(&str) -> Result<T, NativeStatus>,
    failure_message: &str,
) -> Result<Vec<DeviceResult<T>>, AidaError> {
    let results: Vec<_> = devices
        .iter()
        .map(|device| DeviceResult {
            device: device.clone(),
            result: query(device),
        })
        .collect();
    if results.iter().all(|r| r.result.is_err()) {
        return Err(AidaError::unable_to_get(failure_message));
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExceptionKind;

    struct TableOnly;
    impl ChannelProvider for TableOnly {
        fn request_table(&self, _uri: &str, _arguments: &Arguments) -> Result<Table, AidaError> {
            Ok(Table::empty())
        }
    }

    #[test]
    fn unimplemented_shapes_are_unsupported() {
        let err = request_scalar(&TableOnly, "TEST:CHAN", &Arguments::new(), AidaType::Float)
            .unwrap_err();
        assert_eq!(err.kind(), ExceptionKind::UnsupportedChannel);
        assert_eq!(err.message(), Some("TEST:CHAN"));
        let err = request_array(&TableOnly, "TEST:CHAN", &Arguments::new(), AidaType::ShortArray)
            .unwrap_err();
        assert_eq!(err.kind(), ExceptionKind::UnsupportedChannel);
        assert!(TableOnly.request_table("TEST:CHAN", &Arguments::new()).is_ok());
        assert!(TableOnly.channel_config("TEST:CHAN", true).is_default());
    }

    #[test]
    fn partial_device_failures() {
        let devices: Vec<String> = ["A", "B", "C"].map(String::from).into();
        let results = query_devices(
            &devices,
            |d| {
                if d == "B" {
                    Err(NativeStatus::new(0, "no such device"))
                } else {
                    Ok(d.len())
                }
            },
            "Failed",
        )
        .unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[1].result.is_err());
        assert_eq!(results[2].device, "C");

        let err = query_devices(&devices, |_| Err::<(), _>(NativeStatus::new(0, "")), "Failed")
            .unwrap_err();
        assert_eq!(err.kind(), ExceptionKind::UnableToGetData);
    }
}
