//! Instrument catalog: maps index trading symbols to broker tokens.

use serde::Deserialize;

use super::provider::DataError;

/// Segment name the broker uses for index instruments.
pub const INDICES_SEGMENT: &str = "INDICES";

/// One row of the broker's instrument dump. Extra columns are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Instrument {
    pub instrument_token: u64,
    pub tradingsymbol: String,
    #[serde(default)]
    pub name: String,
    pub segment: String,
    #[serde(default)]
    pub exchange: String,
}

#[derive(Debug, Clone, Default)]
pub struct InstrumentCatalog {
    instruments: Vec<Instrument>,
}

impl InstrumentCatalog {
    pub fn new(instruments: Vec<Instrument>) -> Self {
        Self { instruments }
    }

    /// Parse the CSV instrument dump.
    pub fn from_csv(text: &str) -> Result<Self, DataError> {
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let mut instruments = Vec::new();
        for record in reader.deserialize::<Instrument>() {
            let instrument = record.map_err(|e| {
                DataError::ResponseFormatChanged(format!("instrument dump: {e}"))
            })?;
            instruments.push(instrument);
        }
        Ok(Self { instruments })
    }

    /// Token of the index whose trading symbol is `symbol`.
    pub fn resolve_index(&self, symbol: &str) -> Option<u64> {
        self.instruments
            .iter()
            .find(|i| i.tradingsymbol == symbol && i.segment == INDICES_SEGMENT)
            .map(|i| i.instrument_token)
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = "\
instrument_token,exchange_token,tradingsymbol,name,last_price,expiry,strike,tick_size,lot_size,instrument_type,segment,exchange
260105,1016,NIFTY BANK,NIFTY BANK,0,,0,0,0,EQ,INDICES,NSE
259849,1015,NIFTY IT,NIFTY IT,0,,0,0,0,EQ,INDICES,NSE
738561,2885,RELIANCE,RELIANCE INDUSTRIES,0,,0,0.05,1,EQ,NSE,NSE
999999,1,NIFTY BANK,NIFTY BANK FUT,0,,0,0.05,15,FUT,NFO-FUT,NFO
";

    #[test]
    fn parses_dump() {
        let catalog = InstrumentCatalog::from_csv(DUMP).unwrap();
        assert_eq!(catalog.len(), 4);
    }

    #[test]
    fn resolves_only_index_segment() {
        let catalog = InstrumentCatalog::from_csv(DUMP).unwrap();
        assert_eq!(catalog.resolve_index("NIFTY BANK"), Some(260105));
        assert_eq!(catalog.resolve_index("NIFTY IT"), Some(259849));
        assert_eq!(catalog.resolve_index("RELIANCE"), None);
        assert_eq!(catalog.resolve_index("NIFTY AUTO"), None);
    }

    #[test]
    fn malformed_dump_is_format_error() {
        let err = InstrumentCatalog::from_csv("tradingsymbol\nNIFTY BANK\n").unwrap_err();
        assert!(matches!(err, DataError::ResponseFormatChanged(_)));
    }
}
