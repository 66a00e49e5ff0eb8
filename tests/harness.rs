#![allow(non_snake_case)]

mod claim;
mod enter;
mod fetch_state;
