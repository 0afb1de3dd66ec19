/// Validation hook run once on a freshly loaded configuration.
///
/// ```
/// use cfg_overlay::Validate;
///
/// struct Limits {
///     max: u32,
/// }
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("max must be positive")]
/// struct ZeroMax;
///
/// impl Validate for Limits {
///     type Error = ZeroMax;
///
///     fn validate(&self) -> Result<(), ZeroMax> {
///         if self.max == 0 { Err(ZeroMax) } else { Ok(()) }
///     }
/// }
/// ```
pub trait Validate {
    type Error: std::error::Error + Send + Sync + 'static;

    fn validate(&self) -> Result<(), Self::Error>;
}
