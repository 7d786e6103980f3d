use chrono::{DateTime, Utc};
use mongodb::bson::DateTime as BsonDateTime;

/// Convert a chrono timestamp into the BSON datetime used inside `doc!`
/// update payloads. Millisecond precision, matching what MongoDB stores.
pub fn chrono_to_bson(dt: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn chrono_to_bson_keeps_millis() {
        let dt = Utc.with_ymd_and_hms(2024, 5, 17, 12, 30, 45).unwrap();
        let bson_dt = chrono_to_bson(dt);
        assert_eq!(bson_dt.timestamp_millis(), dt.timestamp_millis());
    }
}
