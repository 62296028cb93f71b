// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{Decimal, Value};
use chrono::NaiveDate;
use quickcheck::{Arbitrary, Gen};

impl Arbitrary for Decimal {
    fn arbitrary(g: &mut Gen) -> Self {
        // i64::MIN has no positive counterpart and cannot be parsed back from text
        let units = i64::arbitrary(g).max(i64::MIN + 1);
        let scale = u8::arbitrary(g) % (Decimal::MAX_SCALE + 1);
        Decimal { units, scale }
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        let scale = self.scale;
        Box::new(
            self.units
                .shrink()
                .filter(|&units| units != i64::MIN)
                .map(move |units| Decimal { units, scale }),
        )
    }
}

impl Arbitrary for Value {
    fn arbitrary(g: &mut Gen) -> Self {
        match u8::arbitrary(g) % 7 {
            0 => Value::Bool(bool::arbitrary(g)),
            1 => Value::Integer(i64::arbitrary(g)),
            2 => Value::Text(String::arbitrary(g)),
            3 => {
                // anywhere within a few centuries of the epoch
                let days = i32::arbitrary(g) % 100_000;
                let date = NaiveDate::from_num_days_from_ce_opt(719_163 + days)
                    .unwrap_or(NaiveDate::MIN);
                Value::Date(date)
            }
            4 => Value::Decimal(Decimal::arbitrary(g)),
            5 => Value::Bytes(Vec::arbitrary(g)),
            _ => Value::Link(u32::arbitrary(g)),
        }
    }
}
