//! Measurement input screen as a plain state machine, independent of any
//! rendering toolkit and of the store.

pub mod state;

pub use state::{
    session_name, ScreenAction, ScreenEffect, ScreenError, ScreenState, ANGLES, DISTANCES,
    EMPTY_LIST_MESSAGE,
};
