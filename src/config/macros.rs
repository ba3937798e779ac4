/// Configuration macros for single-declaration config sections
///
/// `config_struct!` takes a struct whose fields carry their default value
/// inline and generates:
/// - the struct with public fields
/// - the `Default` implementation from the inline values
/// - serde support with `#[serde(default)]`, so a TOML file only needs the
///   keys it overrides
///
/// # Example
/// ```
/// pool_history::config_struct! {
///     pub struct BatchConfig {
///         delay_ms: u64 = 1500,
///     }
/// }
///
/// assert_eq!(BatchConfig::default().delay_ms, 1500);
/// ```
#[macro_export]
macro_rules! config_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_name:ident: $field_type:ty = $default_value:expr
            ),*
            $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(default)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                pub $field_name: $field_type,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $(
                        $field_name: $default_value,
                    )*
                }
            }
        }
    };
}
