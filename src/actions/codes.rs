// src/actions/codes.rs

/// Integer identifying a user/system command.
pub type ActionCode = u16;

/// Size of the action table. Codes are `1..MAX_ACTION`.
pub const MAX_ACTION: usize = 520;

pub const ACT_CANCEL: ActionCode = 1;
pub const ACT_EXIT: ActionCode = 2;
pub const ACT_HELP: ActionCode = 3;
pub const ACT_ABOUT: ActionCode = 4;
pub const ACT_EXIT_SYSTEM: ActionCode = 5;
pub const ACT_PREV_FIELD: ActionCode = 10;
pub const ACT_NEXT_FIELD: ActionCode = 11;
pub const ACT_PREV_RECORD: ActionCode = 12;
pub const ACT_NEXT_RECORD: ActionCode = 13;
pub const ACT_PREV_PAGE: ActionCode = 14;
pub const ACT_NEXT_PAGE: ActionCode = 15;
pub const ACT_BEGIN_TABLE: ActionCode = 16;
pub const ACT_END_TABLE: ActionCode = 17;
pub const ACT_CUT: ActionCode = 20;
pub const ACT_COPY: ActionCode = 21;
pub const ACT_PASTE: ActionCode = 22;
pub const ACT_UNDO: ActionCode = 23;
pub const ACT_CLEAR_VALUE: ActionCode = 24;
pub const ACT_BEGIN_LINE: ActionCode = 25;
pub const ACT_END_LINE: ActionCode = 26;
pub const ACT_SELECT_ALL: ActionCode = 27;
pub const ACT_NEWLINE: ActionCode = 30;
pub const ACT_PREV_LINE: ActionCode = 31;
pub const ACT_NEXT_LINE: ActionCode = 32;
pub const ACT_BEGIN_PAGE: ActionCode = 33;
pub const ACT_END_PAGE: ActionCode = 34;
pub const ACT_CREATE: ActionCode = 40;
pub const ACT_MODIFY: ActionCode = 41;
pub const ACT_QUERY: ActionCode = 42;
pub const ACT_DELETE: ActionCode = 43;
pub const ACT_LOCATE: ActionCode = 44;
pub const ACT_RANGE: ActionCode = 45;
pub const ACT_VIEW_REFRESH: ActionCode = 46;
pub const ACT_OK: ActionCode = 50;
pub const ACT_CLOSE: ActionCode = 51;
pub const ACT_WINDOW_LIST: ActionCode = 60;
pub const ACT_WINDOW_CASCADE: ActionCode = 61;
pub const ACT_WINDOW_TILE: ActionCode = 62;

/// Predefined code groups toggled as a unit by the lifecycle controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionGroup {
    /// Always enabled once a task starts.
    Baseline,
    /// Only meaningful on the application's main frame.
    MainFrame,
    TextEditing,
    MultiLineEditing,
    TableNavigation,
    PasteOnly,
}

impl ActionGroup {
    pub fn codes(self) -> &'static [ActionCode] {
        match self {
            ActionGroup::Baseline => &[
                ACT_CANCEL,
                ACT_EXIT,
                ACT_HELP,
                ACT_PREV_FIELD,
                ACT_NEXT_FIELD,
                ACT_OK,
                ACT_CLOSE,
                ACT_VIEW_REFRESH,
            ],
            ActionGroup::MainFrame => &[
                ACT_ABOUT,
                ACT_EXIT_SYSTEM,
                ACT_WINDOW_LIST,
                ACT_WINDOW_CASCADE,
                ACT_WINDOW_TILE,
            ],
            ActionGroup::TextEditing => &[
                ACT_CUT,
                ACT_COPY,
                ACT_UNDO,
                ACT_CLEAR_VALUE,
                ACT_BEGIN_LINE,
                ACT_END_LINE,
                ACT_SELECT_ALL,
            ],
            ActionGroup::MultiLineEditing => &[
                ACT_NEWLINE,
                ACT_PREV_LINE,
                ACT_NEXT_LINE,
                ACT_BEGIN_PAGE,
                ACT_END_PAGE,
            ],
            ActionGroup::TableNavigation => &[
                ACT_PREV_RECORD,
                ACT_NEXT_RECORD,
                ACT_PREV_PAGE,
                ACT_NEXT_PAGE,
                ACT_BEGIN_TABLE,
                ACT_END_TABLE,
            ],
            ActionGroup::PasteOnly => &[ACT_PASTE],
        }
    }
}
