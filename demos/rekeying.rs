// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Secures a small dataset with a password, then renews its keys.
use std::cmp::Ordering;
use verdata::{
    DataItem, DataList, DataSet, FieldDef, ListStyle, Record, Result, UserLists, Value,
    encrypted::EncryptedField,
    security::{CipherSet, PasswordSecurity},
    task::{RecordingTask, TaskControl, TaskEvent},
};

#[derive(Clone, Debug)]
struct Card {
    item: DataItem,
}

impl Card {
    const HOLDER: usize = 0;
    const NUMBER: usize = 1;

    fn holder(&self) -> &str {
        self.item
            .value(Self::HOLDER)
            .and_then(Value::as_text)
            .unwrap_or_default()
    }

    fn key(&self) -> String {
        self.item
            .values()
            .get(Self::NUMBER)
            .and_then(|field| field.as_encrypted())
            .and_then(EncryptedField::control_key)
            .map_or_else(|| "-".to_owned(), |key| key.to_string())
    }
}

impl Record for Card {
    const LIST_NAME: &'static str = "Cards";
    const FIELDS: &'static [FieldDef] = &[FieldDef::plain("Holder"), FieldDef::encrypted("Number")];

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
        self.holder().cmp(other.holder())
    }
}

#[derive(Clone, Debug)]
struct Wallet {
    cards: DataList<Card>,
}

impl UserLists for Wallet {
    fn derive_lists(&self, style: ListStyle) -> Result<Self> {
        Ok(Self {
            cards: self.cards.derive_list(style)?,
        })
    }

    fn difference_lists(&self, old: &Self) -> Self {
        Self {
            cards: self.cards.derive_differences(&old.cards),
        }
    }

    fn re_base(&mut self, base: &Self) -> usize {
        self.cards.re_base(&base.cards)
    }

    fn update_security(&mut self, cipher: &CipherSet, task: &mut dyn TaskControl) -> Result<bool> {
        self.cards.update_security(cipher, task)
    }

    fn adopt_security(
        &mut self,
        cipher: &CipherSet,
        base: &Self,
        task: &mut dyn TaskControl,
    ) -> Result<bool> {
        self.cards.adopt_security(cipher, &base.cards, task)
    }

    fn commit_changes(&mut self) -> usize {
        self.cards.commit_changes()
    }

    fn roll_back_changes(&mut self) -> bool {
        self.cards.roll_back_changes()
    }
}

fn print(title: &str, set: &DataSet<Wallet>) {
    println!(
        "{title}: active control key {:?}, key ring {:?}",
        set.active_control_key(),
        set.key_ring().ids().collect::<Vec<_>>()
    );
    for card in &set.lists().cards {
        println!("  {:<8} {:<8} encrypted under {}", card.holder(), card.item().state(), card.key());
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut cards = DataList::new(ListStyle::Core);
    for (id, holder, number) in [(1, "Ada", "4111 1111 1111 1111"), (2, "Grace", "5500 0000 0000 0004")] {
        let mut values = Card::new_values();
        values.set(Card::HOLDER, holder);
        values.set_encrypted(Card::NUMBER, EncryptedField::new(number.into()));
        cards.add_loaded(id, values)?;
    }
    let mut set = DataSet::new(Wallet { cards });
    let provider = PasswordSecurity::new("correct horse battery staple");

    let mut task = RecordingTask::new();
    set.initialise_security(&provider, &mut task)?;
    set.commit_changes();
    print("initialised", &set);

    let mut task = RecordingTask::new();
    if !set.renew_security(&provider, &mut task)? {
        println!("renewal cancelled, rolling back");
        set.roll_back_changes();
        return Ok(());
    }
    for event in &task.events {
        if let TaskEvent::Stage(stage) = event {
            println!("stage: {stage}");
        }
    }
    print("renewed", &set);

    set.commit_changes();
    print("committed", &set);
    Ok(())
}
