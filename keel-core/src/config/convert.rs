/// A resolved configuration leaf.
///
/// Scalars keep the textual form they had in their source (a yaml number,
/// a bool literal, an environment variable) and are parsed into concrete
/// types at access time. Branch nodes of a document never become values;
/// looking one up is a miss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    Scalar(String),
    List(Vec<ConfigValue>),
}

impl ConfigValue {
    pub fn scalar(text: impl Into<String>) -> Self {
        ConfigValue::Scalar(text.into())
    }

    fn as_scalar(&self) -> Option<&str> {
        match self {
            ConfigValue::Scalar(text) => Some(text),
            ConfigValue::List(_) => None,
        }
    }
}

/// Conversion from a configuration leaf into a concrete type.
///
/// Returning `None` makes the config layer report a `WrongType` error
/// carrying [`EXPECTED`](FromConfigValue::EXPECTED) and the offending key.
pub trait FromConfigValue: Sized {
    /// Human-readable type label used in error messages.
    const EXPECTED: &'static str;

    fn parse(value: &ConfigValue) -> Option<Self>;
}

impl FromConfigValue for String {
    const EXPECTED: &'static str = "string";

    fn parse(value: &ConfigValue) -> Option<Self> {
        value.as_scalar().map(str::to_owned)
    }
}

impl FromConfigValue for bool {
    const EXPECTED: &'static str = "boolean";

    fn parse(value: &ConfigValue) -> Option<Self> {
        match value.as_scalar()?.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

macro_rules! parse_scalar_impl {
    ( $( $ty:ty => $label:literal ),+ $(,)? ) => {
        $(
            impl FromConfigValue for $ty {
                const EXPECTED: &'static str = $label;

                fn parse(value: &ConfigValue) -> Option<Self> {
                    value.as_scalar()?.trim().parse().ok()
                }
            }
        )+
    };
}

parse_scalar_impl! {
    i64 => "integer",
    u64 => "unsigned integer",
    usize => "unsigned integer",
    u16 => "16-bit unsigned integer",
    f64 => "floating point number",
}

impl<T: FromConfigValue> FromConfigValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn parse(value: &ConfigValue) -> Option<Self> {
        T::parse(value).map(Some)
    }
}

impl<T: FromConfigValue> FromConfigValue for Vec<T> {
    const EXPECTED: &'static str = "list";

    fn parse(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::List(items) => items.iter().map(T::parse).collect(),
            // a scalar splits on commas, so environment variables can
            // supply lists
            ConfigValue::Scalar(text) => text
                .split(',')
                .map(|part| T::parse(&ConfigValue::scalar(part.trim())))
                .collect(),
        }
    }
}
