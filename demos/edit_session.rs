// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Walks through one edit session: load, edit in a view, prepare, commit.
//!
//! Run with `RUST_LOG=debug cargo run --example edit_session` to see the list
//! operations as they happen.
use std::cmp::Ordering;
use verdata::{DataItem, DataList, FieldDef, ListStyle, Record, Result, Value};

#[derive(Clone, Debug)]
struct Payee {
    item: DataItem,
}

impl Payee {
    const NAME: usize = 0;
    const CITY: usize = 1;

    fn name(&self) -> &str {
        self.item
            .value(Self::NAME)
            .and_then(Value::as_text)
            .unwrap_or_default()
    }
}

impl Record for Payee {
    const LIST_NAME: &'static str = "Payees";
    const FIELDS: &'static [FieldDef] = &[FieldDef::plain("Name"), FieldDef::plain("City")];

    fn item(&self) -> &DataItem {
        &self.item
    }

    fn item_mut(&mut self) -> &mut DataItem {
        &mut self.item
    }

    fn from_item(item: DataItem) -> Self {
        Self { item }
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.name().cmp(other.name())
    }
}

fn print(title: &str, list: &DataList<Payee>) {
    println!("{title} (version {}, {:?}):", list.version(), list.edit_state());
    for payee in list {
        let item = payee.item();
        println!("  #{} {:<10} {}", item.id(), item.state(), payee.name());
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut core = DataList::<Payee>::new(ListStyle::Core);
    for (id, name, city) in [(1, "Bakery", "Berlin"), (2, "Gym", "Munich"), (3, "Landlord", "Berlin")] {
        let mut values = Payee::new_values();
        values.set(Payee::NAME, name);
        values.set(Payee::CITY, city);
        core.add_loaded(id, values)?;
    }
    print("loaded", &core);

    let mut edit = core.derive_list(ListStyle::Edit)?;
    let mut tx = edit.begin_edit(2)?;
    tx.set(Payee::NAME, "Climbing gym");
    tx.commit();
    edit.delete_item(3)?;
    let mut values = Payee::new_values();
    values.set(Payee::NAME, "Bookshop");
    values.set(Payee::CITY, "Hamburg");
    edit.add_new(values);
    print("edit view", &edit);

    let prepared = core.prepare_changes(&edit)?;
    println!("prepared {prepared} changes");
    print("core, prepared", &core);

    // a failed save would call `core.roll_back_changes()` here instead
    let committed = core.commit_changes();
    println!("committed {committed} records");
    print("core, committed", &core);
    Ok(())
}
