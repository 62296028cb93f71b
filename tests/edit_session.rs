//! A full edit session: derive an edit view, change it, fold it back into the
//! core list, and commit or roll back.

mod common;

use common::{Account, Finance, init_tracing};
use verdata::{DataList, DataState, EditState, ErrorKind, ListStyle, Record, RecordId};

fn state(list: &DataList<Account>, id: RecordId) -> DataState {
    list.get(id).unwrap().item().state()
}

fn names(list: &DataList<Account>) -> Vec<&str> {
    list.iter().map(Account::name).collect()
}

/// Renames account 1, deletes account 2 and adds a new account in an edit view.
fn edited(core: &DataList<Account>) -> (DataList<Account>, RecordId) {
    let mut edit = core.derive_list(ListStyle::Edit).unwrap();
    let mut tx = edit.begin_edit(1).unwrap();
    tx.set(Account::NAME, "Checking");
    assert!(tx.commit());
    edit.delete_item(2).unwrap();
    let added = edit.add_new(Account::values("Credit", "-250.00"));
    (edit, added)
}

#[test]
fn edit_view_tracks_states() {
    init_tracing();
    let finance = Finance::sample();
    let (edit, added) = edited(&finance.accounts);

    assert_eq!(state(&edit, 1), DataState::Changed);
    assert_eq!(state(&edit, 2), DataState::Deleted);
    assert_eq!(state(&edit, added), DataState::New);
    assert_eq!(added, 3, "ids continue after the core list's");
    assert!(edit.has_updates());

    // the core list is untouched until changes are prepared
    assert_eq!(names(&finance.accounts), ["Current", "Savings"]);
    assert!(!finance.accounts.has_updates());
}

#[test]
fn prepare_and_commit() {
    init_tracing();
    let mut finance = Finance::sample();
    let (edit, added) = edited(&finance.accounts);

    let core = &mut finance.accounts;
    assert_eq!(core.prepare_changes(&edit).unwrap(), 3);
    assert_eq!(state(core, 1), DataState::Changed);
    assert_eq!(state(core, 2), DataState::Deleted);
    assert_eq!(state(core, added), DataState::New);

    // an update view holds exactly what a backing store has to write
    let update = core.derive_list(ListStyle::Update).unwrap();
    assert_eq!(update.len(), 3);

    assert_eq!(core.commit_changes(), 3);
    assert_eq!(names(core), ["Checking", "Credit"]);
    assert!(core.iter().all(|account| account.item().state() == DataState::Clean));
    assert_eq!(core.version(), 0);
    assert_eq!(core.edit_state(), EditState::Clean);
    assert!(!core.contains(2));
}

#[test]
fn prepare_and_roll_back() {
    init_tracing();
    let mut finance = Finance::sample();
    let (edit, added) = edited(&finance.accounts);

    let core = &mut finance.accounts;
    core.prepare_changes(&edit).unwrap();
    assert!(core.roll_back_changes());

    assert_eq!(names(core), ["Current", "Savings"]);
    assert!(!core.contains(added));
    assert_eq!(state(core, 1), DataState::Clean);
    assert_eq!(state(core, 2), DataState::Clean);
    assert!(!core.roll_back_changes(), "nothing left to roll back");
}

#[test]
fn abandoned_edit_changes_nothing() {
    let mut finance = Finance::sample();
    let mut edit = finance.accounts.derive_list(ListStyle::Edit).unwrap();
    {
        let mut tx = edit.begin_edit(1).unwrap();
        tx.set(Account::NAME, "Scratch");
        assert_eq!(tx.record().name(), "Scratch");
    }
    assert_eq!(edit.get(1).unwrap().name(), "Current");
    assert_eq!(state(&edit, 1), DataState::Clean);
    assert_eq!(edit.version(), 0);
    assert_eq!(finance.accounts.prepare_changes(&edit).unwrap(), 0);
}

#[test]
fn recovering_a_deleted_record() {
    init_tracing();
    let mut finance = Finance::sample();
    let core = &mut finance.accounts;
    core.delete_item(2).unwrap();
    assert_eq!(state(core, 2), DataState::Deleted);

    // a view of a deleted record starts out deleted
    let mut edit = core.derive_list(ListStyle::Edit).unwrap();
    assert_eq!(state(&edit, 2), DataState::Deleted);
    edit.recover_item(2).unwrap();
    assert_eq!(state(&edit, 2), DataState::Recovered);

    assert_eq!(core.prepare_changes(&edit).unwrap(), 1);
    let item = core.get(2).unwrap().item();
    assert!(!item.is_deleted());
    assert!(item.is_restoring());

    core.commit_changes();
    let item = core.get(2).unwrap().item();
    assert_eq!(item.state(), DataState::Clean);
    assert!(!item.is_restoring());
}

#[test]
fn validation_errors_surface_on_the_list() {
    let finance = Finance::sample();
    let mut edit = finance.accounts.derive_list(ListStyle::Edit).unwrap();
    let mut tx = edit.begin_edit(1).unwrap();
    tx.set(Account::NAME, "");
    tx.clear(Account::BALANCE);
    assert!(tx.commit());

    let item = edit.get(1).unwrap().item();
    assert!(item.has_errors());
    assert_eq!(
        item.field_errors(Account::NAME).collect::<Vec<_>>(),
        ["Name is required"]
    );
    assert_eq!(
        item.field_errors(Account::BALANCE).collect::<Vec<_>>(),
        ["Balance is required"]
    );
    assert_eq!(edit.edit_state(), EditState::Error);
    assert!(edit.has_errors());

    // fixing the record clears the errors again
    let mut tx = edit.begin_edit(1).unwrap();
    tx.set(Account::NAME, "Current");
    tx.set(Account::BALANCE, "1.00".parse::<verdata::Decimal>().unwrap());
    assert!(tx.commit());
    assert!(!edit.has_errors());
    assert_eq!(edit.edit_state(), EditState::Valid);
}

#[test]
fn misuse_is_reported() {
    let mut finance = Finance::sample();
    let view = finance.accounts.derive_list(ListStyle::View).unwrap();

    let err = finance.accounts.prepare_changes(&view).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Logic);
    assert_eq!(err.to_string(), "cannot prepare changes from a VIEW list");

    let err = finance.accounts.begin_edit(99).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Data);
    assert_eq!(err.to_string(), "Accounts has no record with id 99");

    let err = finance.accounts.derive_list(ListStyle::Differ).unwrap_err();
    assert_eq!(err.to_string(), "cannot derive a DIFFER list");
}

#[test]
fn edits_keep_list_order() {
    let mut finance = Finance::sample();
    let core = &mut finance.accounts;
    let mut tx = core.begin_edit(2).unwrap();
    tx.set(Account::NAME, "Assets");
    assert!(tx.commit());
    assert_eq!(names(core), ["Assets", "Current"]);
    assert_eq!(core.position(2), Some(0));
    assert_eq!(core.ids().collect::<Vec<_>>(), [2, 1]);
}

#[cfg(feature = "json")]
#[test]
fn edit_view_renders_as_json() {
    let finance = Finance::sample();
    let mut edit = finance.accounts.derive_list(ListStyle::Edit).unwrap();
    let mut tx = edit.begin_edit(1).unwrap();
    tx.set(Account::NAME, "Checking");
    assert!(tx.commit());

    let json = edit.to_json();
    assert_eq!(json[0]["state"], "CHANGED");
    assert_eq!(json[0]["fields"]["Name"], "Checking");
    assert_eq!(json[0]["fields"]["Balance"], "120.50");
    assert_eq!(json[1]["state"], "CLEAN");
}
