//! Routes requests for a channel to the one provider operation that serves them.
//!
//! A request is a channel name and its arguments. Two arguments are special:
//!
//! - `TYPE` selects the result type, where the channel's configuration allows
//!   a choice.
//! - `VALUE`, when present, makes the request a set, and is passed to the
//!   provider as the value to set.
//!
//! Everything else is checked against the channel's list of accepted
//! arguments and handed to the provider unchanged.

use std::fmt;

use tracing::{debug, info};

use crate::{
    arguments::Arguments,
    channels::ChannelRegistry,
    error::{AidaError, Fault},
    providers::{ChannelProvider, request_array, request_scalar},
    types::{AidaType, Config, Layout, UnknownType},
    uri,
    value::{Payload, Value},
};

/// Argument selecting the result type
pub const TYPE_ARGUMENT: &str = "TYPE";
/// Argument carrying the value to set
pub const VALUE_ARGUMENT: &str = "VALUE";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum RequestKind {
    Get,
    Set,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Get => "Get",
                Self::Set => "Set",
            }
        )
    }
}

/// Configures and starts an [`AidaService`]
pub struct ServiceBuilder<P: ChannelProvider> {
    provider: P,
    registry: Option<ChannelRegistry>,
}

impl<P: ChannelProvider> ServiceBuilder<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            registry: None,
        }
    }

    /// Serve these channels, instead of loading the channel file
    pub fn channels(mut self, registry: ChannelRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Initialise the provider, after which the service accepts requests
    pub fn start(mut self) -> Result<AidaService<P>, AidaError> {
        let registry = match self.registry.take() {
            Some(registry) => registry,
            None => ChannelRegistry::load_default()?,
        };
        self.provider.service_init()?;
        info!("AIDA-pva Channel Provider : {}", registry.name());
        if let Some(description) = registry.description() {
            debug!("{description}");
        }
        info!("Channels hosted: {:?}", registry.abbreviated_names());
        Ok(AidaService {
            provider: self.provider,
            registry,
        })
    }
}

/// A running channel provider, answering requests for its channels
pub struct AidaService<P: ChannelProvider> {
    provider: P,
    registry: ChannelRegistry,
}

impl<P: ChannelProvider> AidaService<P> {
    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn into_provider(self) -> P {
        self.provider
    }

    /// The effective getter or setter configuration of a channel
    ///
    /// This is the channel file entry with the provider's override laid over
    /// it, or a config of type `NONE` if the channel has no such operation.
    pub fn channel_config(&self, channel: &str, for_getter: bool) -> Config {
        let stripped = uri::remove_service_prefix(channel);
        // Channel files may define the prefixed name itself
        let configured = self
            .configured(channel, for_getter)
            .or_else(|| self.configured(stripped, for_getter));
        let channel = stripped;
        let mut config = configured.cloned().unwrap_or_default();
        config.apply_override(&self.provider.channel_config(channel, for_getter));
        config
    }

    fn configured(&self, channel: &str, for_getter: bool) -> Option<&Config> {
        if for_getter {
            self.registry.getter_config(channel)
        } else {
            self.registry.setter_config(channel)
        }
    }

    /// How a table read from this channel should be laid out on the wire
    pub fn layout(&self, channel: &str) -> Option<Layout> {
        self.channel_config(channel, true).table_layout()
    }

    /// Serve one get or set request
    ///
    /// On failure the returned [`Fault`] carries an empty payload of the
    /// requested type, or of the configured type if none was requested.
    pub fn request(&mut self, channel: &str, arguments: &Arguments) -> Result<Payload, Fault> {
        let kind = if arguments.iter().any(|a| a.is_named(VALUE_ARGUMENT)) {
            RequestKind::Set
        } else {
            RequestKind::Get
        };
        let config = self.channel_config(channel, kind == RequestKind::Get);
        let fallback = arguments
            .get(TYPE_ARGUMENT)
            .and_then(|t| t.value().parse().ok())
            .unwrap_or(config.ty);
        self.dispatch(channel, arguments, kind, &config)
            .map_err(|error| Fault {
                error,
                empty: Payload::empty(fallback),
            })
    }

    fn dispatch(
        &mut self,
        channel: &str,
        arguments: &Arguments,
        kind: RequestKind,
        config: &Config,
    ) -> Result<Payload, AidaError> {
        if config.ty == AidaType::None {
            return Err(AidaError::unsupported_channel(&format!(
                "{channel}{arguments}.  {kind} requests are not supported for this channel"
            )));
        }
        let ty = resolve_type(arguments, kind, config.ty)?;
        if ty == AidaType::Table && config.fields.is_empty() {
            return Err(AidaError::internal(
                "Table channel configured without defining fields",
            ));
        }
        if let Some(invalid) = arguments.iter().find(|a| {
            !a.is_named(TYPE_ARGUMENT) && !a.is_named(VALUE_ARGUMENT) && !config.accepts_argument(a.name())
        }) {
            return Err(AidaError::unsupported_channel(&format!(
                "{channel}:  {} is not a valid argument for {} requests to this channel. Valid arguments are: [{}]",
                invalid.name().to_uppercase(),
                kind.to_string().to_lowercase(),
                config.arguments.join(", ")
            )));
        }

        let uri = uri::to_new_format(uri::remove_service_prefix(channel));
        info!("AIDA {kind}Value: {channel}{arguments} => {ty}");

        match kind {
            RequestKind::Set => {
                let value = arguments
                    .get(VALUE_ARGUMENT)
                    .map_or_else(|| Value::String(String::new()), |v| Value::from_wire(v.value()));
                match ty {
                    AidaType::Void => {
                        self.provider.set_value(&uri, arguments, &value)?;
                        Ok(Payload::Void)
                    }
                    AidaType::Table => Ok(Payload::Table(
                        self.provider.set_value_with_response(&uri, arguments, &value)?,
                    )),
                    _ => Err(AidaError::unsupported_channel(&uri)),
                }
            }
            RequestKind::Get => match ty {
                AidaType::Table => Ok(Payload::Table(self.provider.request_table(&uri, arguments)?)),
                ty if ty.is_scalar() => Ok(Payload::Scalar(request_scalar(
                    &self.provider,
                    &uri,
                    arguments,
                    ty,
                )?)),
                ty if ty.is_array() => Ok(Payload::Array(request_array(
                    &self.provider,
                    &uri,
                    arguments,
                    ty,
                )?)),
                _ => Err(AidaError::unsupported_channel(&uri)),
            },
        }
    }
}

fn describe(configured: AidaType) -> &'static str {
    match configured {
        AidaType::Scalar => "a scalar type",
        AidaType::ScalarArray => "a scalar array type",
        _ => "any type",
    }
}

/// Work out the concrete type a request returns
fn resolve_type(
    arguments: &Arguments,
    kind: RequestKind,
    configured: AidaType,
) -> Result<AidaType, AidaError> {
    let Some(specified) = arguments.get(TYPE_ARGUMENT) else {
        return match (kind, configured) {
            (RequestKind::Set, AidaType::Any) => Err(AidaError::unsupported_channel(
                "The 'Type' parameter must be set 'VOID' or 'TABLE' but you didn't specify one",
            )),
            (RequestKind::Get, configured) if configured.is_meta() => {
                Err(AidaError::unsupported_channel(&format!(
                    "The 'Type' parameter must be set to {} but you didn't specify one",
                    describe(configured)
                )))
            }
            (_, configured) => Ok(configured),
        };
    };
    let ty: AidaType = specified
        .value()
        .parse()
        .map_err(|e: UnknownType| AidaError::unsupported_channel(&e.to_string()))?;
    if !ty.is_compatible_with(configured) {
        return Err(AidaError::unsupported_channel(&format!(
            "The type specified by the 'Type' parameter must be {}, but you specified {ty}",
            if configured.is_meta() {
                describe(configured).to_string()
            } else {
                configured.to_string()
            }
        )));
    }
    Ok(ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ExceptionKind,
        table::{Table, single_value_table},
        value::{Array, Scalar},
    };

    const CHANNELS: &str = r#"
name = "Test"

[[channel]]
names = ["TEST:DEV:1:VAL"]
getter = { type = "SCALAR", arguments = ["BEAM"] }
setter = { type = "VOID" }

[[channel]]
names = ["TEST:DEV:1:TBL"]
getter = { type = "TABLE", layout = "ROW_MAJOR", fields = [{ name = "value" }] }
setter = { type = "ANY", fields = [{ name = "value" }] }

[[channel]]
names = ["TEST:DEV:1:NOFIELDS"]
getter = { type = "TABLE" }

[[channel]]
names = ["SLC::TEST:DEV:2:VAL"]
getter = { type = "FLOAT" }
"#;

    #[derive(Default)]
    struct Recorder {
        last_uri: String,
        last_set: Option<Value>,
    }

    impl ChannelProvider for Recorder {
        fn request_float(&self, _uri: &str, _arguments: &Arguments) -> Result<f32, AidaError> {
            Ok(1.5)
        }

        fn request_table(&self, _uri: &str, _arguments: &Arguments) -> Result<Table, AidaError> {
            single_value_table(7i32)
        }

        fn set_value(
            &mut self,
            uri: &str,
            _arguments: &Arguments,
            value: &Value,
        ) -> Result<(), AidaError> {
            self.last_uri = uri.to_string();
            self.last_set = Some(value.clone());
            Ok(())
        }
    }

    fn service() -> AidaService<Recorder> {
        let _ = tracing_subscriber::fmt()
            .with_writer(tracing_subscriber::fmt::TestWriter::new())
            .try_init();
        ServiceBuilder::new(Recorder::default())
            .channels(ChannelRegistry::from_toml(CHANNELS).unwrap())
            .start()
            .unwrap()
    }

    #[test]
    fn typed_get() {
        let mut service = service();
        let result = service
            .request("TEST:DEV:1:VAL", &Arguments::new().with("TYPE", "float"))
            .unwrap();
        assert_eq!(result, Payload::Scalar(Scalar::Float(1.5)));

        // A SCALAR channel accepts TABLE, but this one has no fields for it
        let result = service
            .request("TEST:DEV:1:VAL", &Arguments::new().with("TYPE", "TABLE"));
        assert!(matches!(result, Err(f) if f.kind() == ExceptionKind::AidaInternal));
    }

    #[test]
    fn type_is_required_for_meta_channels() {
        let mut service = service();
        let fault = service.request("TEST:DEV:1:VAL", &Arguments::new()).unwrap_err();
        assert_eq!(fault.kind(), ExceptionKind::UnsupportedChannel);
        assert_eq!(fault.empty, Payload::Void);

        let fault = service
            .request("TEST:DEV:1:VAL", &Arguments::new().with("TYPE", "FLOAT_ARRAY"))
            .unwrap_err();
        assert!(fault.to_string().contains("must be a scalar type"));
        assert_eq!(fault.empty, Payload::Array(Array::Float(Vec::new())));

        let fault = service
            .request("TEST:DEV:1:VAL", &Arguments::new().with("TYPE", "QUATERNION"))
            .unwrap_err();
        assert_eq!(fault.kind(), ExceptionKind::UnsupportedChannel);
    }

    #[test]
    fn unsupported_shape_gives_empty_value() {
        let mut service = service();
        let fault = service
            .request("TEST:DEV:1:VAL", &Arguments::new().with("TYPE", "SHORT"))
            .unwrap_err();
        assert_eq!(fault.kind(), ExceptionKind::UnsupportedChannel);
        assert_eq!(fault.error.message(), Some("TEST:DEV:1:VAL"));
        assert_eq!(fault.empty, Payload::Scalar(Scalar::Short(0)));
    }

    #[test]
    fn arguments_are_validated() {
        let mut service = service();
        let fault = service
            .request(
                "TEST:DEV:1:VAL",
                &Arguments::new().with("TYPE", "FLOAT").with("dgrp", "X"),
            )
            .unwrap_err();
        assert_eq!(fault.kind(), ExceptionKind::UnsupportedChannel);
        assert!(fault.to_string().contains(
            "DGRP is not a valid argument for get requests to this channel. Valid arguments are: [BEAM]"
        ));
        assert!(
            service
                .request(
                    "TEST:DEV:1:VAL",
                    &Arguments::new().with("TYPE", "FLOAT").with("beam", "1"),
                )
                .is_ok()
        );
    }

    #[test]
    fn tables_need_fields() {
        let mut service = service();
        assert!(matches!(
            service.request("TEST:DEV:1:TBL", &Arguments::new()),
            Ok(Payload::Table(_))
        ));
        let fault = service
            .request("TEST:DEV:1:NOFIELDS", &Arguments::new())
            .unwrap_err();
        assert_eq!(fault.kind(), ExceptionKind::AidaInternal);
        assert_eq!(fault.empty, Payload::Table(Table::empty()));
        assert_eq!(service.layout("TEST:DEV:1:TBL"), Some(Layout::RowMajor));
        assert_eq!(service.layout("TEST:DEV:1:VAL"), None);
    }

    #[test]
    fn set_requests() {
        let mut service = service();
        let result = service
            .request("SLC::TEST:DEV:1//VAL", &Arguments::new().with("VALUE", "[1, 2]"))
            .unwrap();
        assert_eq!(result, Payload::Void);
        assert_eq!(service.provider().last_uri, "TEST:DEV:1:VAL");
        assert_eq!(
            service.provider().last_set,
            Some(Value::Json(serde_json::json!([1, 2])))
        );

        // An ANY setter has to be told what to return
        let fault = service
            .request("TEST:DEV:1:TBL", &Arguments::new().with("VALUE", "1"))
            .unwrap_err();
        assert!(fault.to_string().contains("'VOID' or 'TABLE'"));

        let fault = service
            .request("TEST:DEV:1:NOFIELDS", &Arguments::new().with("VALUE", "1"))
            .unwrap_err();
        assert!(fault.to_string().contains("Set requests are not supported"));

        let fault = service
            .request(
                "TEST:DEV:1:TBL",
                &Arguments::new().with("VALUE", "1").with("TYPE", "TABLE"),
            )
            .unwrap_err();
        assert_eq!(fault.kind(), ExceptionKind::UnsupportedChannel);
        assert_eq!(fault.empty, Payload::Table(Table::empty()));
    }

    #[test]
    fn prefixed_definitions() {
        let mut service = service();
        let result = service
            .request("SLC::TEST:DEV:2:VAL", &Arguments::new())
            .unwrap();
        assert_eq!(result, Payload::Scalar(Scalar::Float(1.5)));
        assert_eq!(service.channel_config("SLC::TEST:DEV:2:VAL", true).ty, AidaType::Float);
        // Only the prefixed name is defined
        assert_eq!(service.channel_config("TEST:DEV:2:VAL", true).ty, AidaType::None);
        // A prefix on a bare definition still finds it
        assert_eq!(
            service.channel_config("SLC::TEST:DEV:1:VAL", true).ty,
            AidaType::Scalar
        );
    }

    #[test]
    fn empty_value_is_still_a_set() {
        let mut service = service();
        let result = service
            .request("TEST:DEV:1:VAL", &Arguments::new().with("VALUE", ""))
            .unwrap();
        assert_eq!(result, Payload::Void);
        assert_eq!(service.provider().last_set, Some(Value::String(String::new())));

        let fault = service
            .request("TEST:DEV:1:NOFIELDS", &Arguments::new().with("VALUE", ""))
            .unwrap_err();
        assert!(fault.to_string().contains("Set requests are not supported"));
    }

    #[test]
    fn unknown_channel() {
        let fault = service()
            .request("NOT:A:CHANNEL", &Arguments::new())
            .unwrap_err();
        assert!(fault.to_string().contains("Get requests are not supported"));
    }
}
