use serde::Deserialize;
use serde_json::Value;
use ww_core::EspEvent;

use crate::IngestError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Body {
    mac_address: Option<String>,
    data: Option<Value>,
}

/// A decoded `{ "macAddress": ..., "data": [...] }` upload.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestRequest {
    pub mac_address: String,
    pub batch: Vec<EspEvent>,
}

impl IngestRequest {
    pub fn from_json(body: &[u8]) -> Result<Self, IngestError> {
        let body: Body = serde_json::from_slice(body)
            .map_err(|e| IngestError::InvalidArgument(format!("malformed body: {e}")))?;

        let mac_address = body
            .mac_address
            .map(|mac| mac.trim().to_string())
            .filter(|mac| !mac.is_empty())
            .ok_or_else(|| IngestError::InvalidArgument("MAC address is required".into()))?;

        let items = match body.data {
            Some(Value::Array(items)) => items,
            Some(_) => return Err(IngestError::InvalidArgument("data must be a list".into())),
            None => return Err(IngestError::InvalidArgument("data is required".into())),
        };

        let batch = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                serde_json::from_value(item)
                    .map_err(|e| IngestError::InvalidArgument(format!("data[{i}]: {e}")))
            })
            .collect::<Result<Vec<EspEvent>, _>>()?;

        Ok(Self { mac_address, batch })
    }
}
