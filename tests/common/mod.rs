//! Record types and helpers shared by the integration tests.
#![allow(dead_code)]

use std::cmp::Ordering;
use verdata::{
    DataItem, DataList, Decimal, FieldDef, FieldValue, ListStyle, Record, Result, UserLists,
    ValidationErrors, Value, ValueSet, encrypted::EncryptedField, security::CipherSet,
    task::TaskControl,
};

/// Routes `tracing` output through the test harness; filter with `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

#[derive(Clone, Debug)]
pub struct Account {
    item: DataItem,
}

impl Account {
    pub const NAME: usize = 0;
    pub const BALANCE: usize = 1;
    pub const NUMBER: usize = 2;

    pub fn values(name: &str, balance: &str) -> ValueSet {
        let mut values = Self::new_values();
        values.set(Self::NAME, name);
        values.set(Self::BALANCE, balance.parse::<Decimal>().unwrap());
        values
    }

    /// Values with an account number that has not been encrypted yet.
    pub fn with_number(name: &str, balance: &str, number: &str) -> ValueSet {
        let mut values = Self::values(name, balance);
        values.set_encrypted(Self::NUMBER, EncryptedField::new(number.into()));
        values
    }

    pub fn name(&self) -> &str {
        self.item
            .value(Self::NAME)
            .and_then(Value::as_text)
            .unwrap_or_default()
    }

    pub fn balance(&self) -> Option<Decimal> {
        self.item.value(Self::BALANCE).and_then(Value::as_decimal)
    }

    pub fn number(&self) -> Option<&str> {
        self.item.value(Self::NUMBER).and_then(Value::as_text)
    }

    pub fn number_field(&self) -> Option<&EncryptedField<Value>> {
        self.item
            .values()
            .get(Self::NUMBER)
            .and_then(FieldValue::as_encrypted)
    }
}

impl Record for Account {
    const LIST_NAME: &'static str = "Accounts";
    const FIELDS: &'static [FieldDef] = &[
        FieldDef::plain("Name"),
        FieldDef::plain("Balance"),
        FieldDef::encrypted("Number"),
    ];

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

    fn validate(&self, _list: &DataList<Self>, errors: &mut ValidationErrors) {
        if self.name().is_empty() {
            errors.add(Self::NAME, "Name is required");
        }
        if self.balance().is_none() {
            errors.add(Self::BALANCE, "Balance is required");
        }
    }
}

/// A record type without encrypted fields.
#[derive(Clone, Debug)]
pub struct Tag {
    item: DataItem,
}

impl Tag {
    pub const LABEL: usize = 0;

    pub fn values(label: &str) -> ValueSet {
        let mut values = Self::new_values();
        values.set(Self::LABEL, label);
        values
    }

    pub fn label(&self) -> &str {
        self.item
            .value(Self::LABEL)
            .and_then(Value::as_text)
            .unwrap_or_default()
    }
}

impl Record for Tag {
    const LIST_NAME: &'static str = "Tags";
    const FIELDS: &'static [FieldDef] = &[FieldDef::plain("Label")];

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
        self.label().cmp(other.label())
    }
}

#[derive(Clone, Debug)]
pub struct Finance {
    pub accounts: DataList<Account>,
    pub tags: DataList<Tag>,
}

impl Default for Finance {
    fn default() -> Self {
        Self {
            accounts: DataList::new(ListStyle::Core),
            tags: DataList::new(ListStyle::Core),
        }
    }
}

impl Finance {
    /// A core set with two accounts (ids 1 and 2) and one tag (id 1).
    pub fn sample() -> Self {
        let mut finance = Self::default();
        finance
            .accounts
            .add_loaded(1, Account::values("Current", "120.50"))
            .unwrap();
        finance
            .accounts
            .add_loaded(2, Account::values("Savings", "5000.00"))
            .unwrap();
        finance.tags.add_loaded(1, Tag::values("household")).unwrap();
        finance
    }

    /// Like [`Finance::sample`], with account numbers to encrypt.
    pub fn with_numbers() -> Self {
        let mut finance = Self::default();
        finance
            .accounts
            .add_loaded(1, Account::with_number("Current", "120.50", "DE44 5001 0517"))
            .unwrap();
        finance
            .accounts
            .add_loaded(2, Account::with_number("Savings", "5000.00", "DE89 3704 0044"))
            .unwrap();
        finance
            .accounts
            .add_loaded(3, Account::with_number("Travel", "80.00", "GB29 NWBK 6016"))
            .unwrap();
        finance.tags.add_loaded(1, Tag::values("household")).unwrap();
        finance
    }
}

impl UserLists for Finance {
    fn derive_lists(&self, style: ListStyle) -> Result<Self> {
        Ok(Self {
            accounts: self.accounts.derive_list(style)?,
            tags: self.tags.derive_list(style)?,
        })
    }

    fn difference_lists(&self, old: &Self) -> Self {
        Self {
            accounts: self.accounts.derive_differences(&old.accounts),
            tags: self.tags.derive_differences(&old.tags),
        }
    }

    fn re_base(&mut self, base: &Self) -> usize {
        self.accounts.re_base(&base.accounts) + self.tags.re_base(&base.tags)
    }

    fn update_security(&mut self, cipher: &CipherSet, task: &mut dyn TaskControl) -> Result<bool> {
        self.accounts.update_security(cipher, task)
    }

    fn adopt_security(
        &mut self,
        cipher: &CipherSet,
        base: &Self,
        task: &mut dyn TaskControl,
    ) -> Result<bool> {
        self.accounts.adopt_security(cipher, &base.accounts, task)
    }

    fn commit_changes(&mut self) -> usize {
        self.accounts.commit_changes() + self.tags.commit_changes()
    }

    fn roll_back_changes(&mut self) -> bool {
        let accounts = self.accounts.roll_back_changes();
        let tags = self.tags.roll_back_changes();
        accounts || tags
    }
}
