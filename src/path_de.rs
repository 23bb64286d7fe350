use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::ReflectionError;

/// Deserialize with the failing JSON path in the error message.
pub fn decode_str<T: DeserializeOwned>(src: &str) -> Result<T, String> {
    decode(&mut serde_json::Deserializer::from_str(src))
}

pub fn decode_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, String> {
    decode(&mut serde_json::Deserializer::from_slice(bytes))
}

pub fn from_str_with_path<T: DeserializeOwned>(src: &str, origin: &Path) -> Result<T, ReflectionError> {
    decode_str(src).map_err(|message| ReflectionError::Decode { path: origin.to_path_buf(), message })
}

pub fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8], origin: &Path) -> Result<T, ReflectionError> {
    decode_slice(bytes).map_err(|message| ReflectionError::Decode { path: origin.to_path_buf(), message })
}

fn decode<'de, R, T>(de: &mut serde_json::Deserializer<R>) -> Result<T, String>
where
    R: serde_json::de::Read<'de>,
    T: DeserializeOwned,
{
    let value = serde_path_to_error::deserialize::<_, T>(&mut *de).map_err(|err| {
        let path = err.path().to_string();
        format!("at JSON path {path} → {}", err.into_inner())
    })?;
    de.end().map_err(|err| err.to_string())?;
    Ok(value)
}
