mod helpers;
mod mocks;

mod contracts;
mod ledger;
mod webhook;
