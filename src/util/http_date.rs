//! IMF-fixdate formatting (`Sun, 06 Nov 1994 08:49:37 GMT`).

use time::{
    OffsetDateTime, PrimitiveDateTime, UtcOffset, format_description::BorrowedFormatItem,
    macros::format_description,
};

const HTTP_DATE: &[BorrowedFormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

pub fn format(date: OffsetDateTime) -> String {
    date.to_offset(UtcOffset::UTC)
        .format(HTTP_DATE)
        .unwrap_or_default()
}

pub fn parse(value: &str) -> Option<OffsetDateTime> {
    PrimitiveDateTime::parse(value.trim(), HTTP_DATE)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn formats_rfc_example() {
        assert_eq!(
            format(datetime!(1994-11-06 08:49:37 UTC)),
            "Sun, 06 Nov 1994 08:49:37 GMT"
        );
    }

    #[test]
    fn parse_inverts_format_to_the_second() {
        let date = datetime!(2024-02-29 23:59:01.750 +02:00);
        let parsed = parse(&format(date)).expect("parses");
        assert_eq!(parsed.unix_timestamp(), date.unix_timestamp());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse("yesterday").is_none());
    }
}
