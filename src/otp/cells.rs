//! Segmented code entry grid.
//!
//! Cells are addressed by index only; the array owns the buffer, the focus and
//! the disabled flag, and every edit goes through one of the `on_*` handlers.

use super::CODE_LENGTH;
use std::fmt;
use thiserror::Error;

/// Validation failures raised by the entry grid. None of them mutate the buffer.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Please enter digits only.")]
    NotADigit,
    #[error("Please enter digits only.")]
    NoDigitsPasted,
    #[error("cell {0} does not exist")]
    OutOfRange(usize),
    #[error("code entry is disabled")]
    Disabled,
}

/// Keys with special meaning inside the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyAction {
    ArrowLeft,
    ArrowRight,
    Backspace,
}

/// Which cell currently owns the caret, if any.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Focus {
    Cell(usize),
    Blurred,
}

impl Focus {
    /// Focus for the cell following `index`, blurring past the last cell.
    fn after(index: usize) -> Self {
        if index + 1 < CODE_LENGTH {
            Self::Cell(index + 1)
        } else {
            Self::Blurred
        }
    }

    #[must_use]
    pub const fn index(self) -> Option<usize> {
        match self {
            Self::Cell(index) => Some(index),
            Self::Blurred => None,
        }
    }
}

/// What an accepted edit did to the buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    /// Buffer untouched (navigation or a no-op backspace).
    None,
    /// Buffer changed and is not complete.
    Incomplete,
    /// Buffer changed and every slot holds a digit.
    Complete(String),
}

/// Fixed-length code buffer; each slot is empty or one ASCII digit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodeBuffer {
    slots: [Option<char>; CODE_LENGTH],
}

impl CodeBuffer {
    #[must_use]
    pub fn get(&self, index: usize) -> Option<char> {
        self.slots.get(index).copied().flatten()
    }

    #[must_use]
    pub fn slots(&self) -> &[Option<char>; CODE_LENGTH] {
        &self.slots
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// The joined code, only when the buffer is complete.
    #[must_use]
    pub fn code(&self) -> Option<String> {
        self.slots.iter().copied().collect()
    }
}

impl fmt::Display for CodeBuffer {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        for slot in &self.slots {
            write!(formatter, "[{}]", slot.unwrap_or(' '))?;
        }
        Ok(())
    }
}

/// The entry grid: buffer, focus and the expiry gate.
#[derive(Clone, Debug)]
pub struct CodeCellArray {
    buffer: CodeBuffer,
    focus: Focus,
    disabled: bool,
}

impl Default for CodeCellArray {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeCellArray {
    /// New empty grid with the first cell focused.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: CodeBuffer::default(),
            focus: Focus::Cell(0),
            disabled: false,
        }
    }

    #[must_use]
    pub fn buffer(&self) -> &CodeBuffer {
        &self.buffer
    }

    #[must_use]
    pub fn focus(&self) -> Focus {
        self.focus
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Gate driven by the expiry countdown.
    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    /// Writes a single typed character into `index`.
    ///
    /// A digit advances focus to the next cell, or blurs on the last cell.
    ///
    /// # Errors
    ///
    /// Returns `InputError::NotADigit` for anything other than `0-9`, leaving the
    /// slot untouched.
    pub fn on_digit_entered(&mut self, index: usize, ch: char) -> Result<Mutation, InputError> {
        self.ensure_editable(index)?;

        if !ch.is_ascii_digit() {
            return Err(InputError::NotADigit);
        }

        self.buffer.slots[index] = Some(ch);
        self.focus = Focus::after(index);

        Ok(self.changed())
    }

    /// Distributes the digits of pasted text over consecutive cells from `index`.
    ///
    /// Non-digits are dropped and digits beyond the last cell are discarded.
    ///
    /// # Errors
    ///
    /// Returns `InputError::NoDigitsPasted` when the text holds no digit at all.
    pub fn on_paste(&mut self, index: usize, raw_text: &str) -> Result<Mutation, InputError> {
        self.ensure_editable(index)?;

        let digits: Vec<char> = raw_text
            .chars()
            .filter(char::is_ascii_digit)
            .take(CODE_LENGTH - index)
            .collect();

        if digits.is_empty() {
            return Err(InputError::NoDigitsPasted);
        }

        for (offset, digit) in digits.iter().enumerate() {
            self.buffer.slots[index + offset] = Some(*digit);
        }
        self.focus = Focus::after(index + digits.len() - 1);

        Ok(self.changed())
    }

    /// Arrow navigation and backspace.
    ///
    /// Backspace on a filled cell clears only that cell. Backspace on an empty
    /// cell clears the previous cell and moves focus there.
    ///
    /// # Errors
    ///
    /// Returns `InputError::OutOfRange` for a bad `index`, and
    /// `InputError::Disabled` for backspace once the grid is disabled. Arrows
    /// still move the caret on a disabled grid.
    pub fn on_key_action(&mut self, index: usize, action: KeyAction) -> Result<Mutation, InputError> {
        ensure_in_range(index)?;

        match action {
            KeyAction::ArrowLeft => {
                self.focus = Focus::Cell(index.saturating_sub(1));
                Ok(Mutation::None)
            }
            KeyAction::ArrowRight => {
                self.focus = Focus::Cell((index + 1).min(CODE_LENGTH - 1));
                Ok(Mutation::None)
            }
            KeyAction::Backspace => {
                self.ensure_editable(index)?;
                if self.buffer.slots[index].take().is_some() {
                    return Ok(self.changed());
                }
                if index == 0 {
                    return Ok(Mutation::None);
                }

                self.focus = Focus::Cell(index - 1);
                if self.buffer.slots[index - 1].take().is_some() {
                    Ok(self.changed())
                } else {
                    Ok(Mutation::None)
                }
            }
        }
    }

    /// Moves the caret to `index`, as a click on the cell would.
    ///
    /// # Errors
    ///
    /// Returns `InputError::OutOfRange` when `index` is past the last cell.
    pub fn focus_cell(&mut self, index: usize) -> Result<(), InputError> {
        ensure_in_range(index)?;
        self.focus = Focus::Cell(index);
        Ok(())
    }

    /// Empties every cell and focuses the first one.
    pub fn clear(&mut self) {
        self.buffer = CodeBuffer::default();
        self.focus = Focus::Cell(0);
    }

    fn ensure_editable(&self, index: usize) -> Result<(), InputError> {
        if self.disabled {
            return Err(InputError::Disabled);
        }
        ensure_in_range(index)
    }

    fn changed(&self) -> Mutation {
        self.buffer
            .code()
            .map_or(Mutation::Incomplete, Mutation::Complete)
    }
}

fn ensure_in_range(index: usize) -> Result<(), InputError> {
    if index >= CODE_LENGTH {
        return Err(InputError::OutOfRange(index));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digits(cells: &CodeCellArray) -> Vec<Option<char>> {
        cells.buffer().slots().to_vec()
    }

    #[test]
    fn typing_advances_focus_and_blurs_on_last_cell() {
        let mut cells = CodeCellArray::new();
        assert_eq!(cells.focus(), Focus::Cell(0));

        assert_eq!(cells.on_digit_entered(0, '4'), Ok(Mutation::Incomplete));
        assert_eq!(cells.focus(), Focus::Cell(1));
        cells.on_digit_entered(1, '3').unwrap();
        cells.on_digit_entered(2, '2').unwrap();
        assert_eq!(
            cells.on_digit_entered(3, '1'),
            Ok(Mutation::Complete("4321".to_string()))
        );
        assert_eq!(cells.focus(), Focus::Blurred);
    }

    #[test]
    fn non_digit_is_rejected_without_mutation() {
        let mut cells = CodeCellArray::new();
        cells.on_digit_entered(0, '7').unwrap();

        assert_eq!(cells.on_digit_entered(1, 'x'), Err(InputError::NotADigit));
        assert_eq!(cells.on_digit_entered(0, '٣'), Err(InputError::NotADigit));
        assert_eq!(digits(&cells), vec![Some('7'), None, None, None]);
        assert_eq!(cells.focus(), Focus::Cell(1));
        assert_eq!(InputError::NotADigit.to_string(), "Please enter digits only.");
    }

    #[test]
    fn paste_fills_all_cells_and_completes() {
        let mut cells = CodeCellArray::new();
        assert_eq!(
            cells.on_paste(0, "1234"),
            Ok(Mutation::Complete("1234".to_string()))
        );
        assert_eq!(cells.focus(), Focus::Blurred);
    }

    #[test]
    fn paste_drops_non_digits_and_overflow() {
        let mut cells = CodeCellArray::new();
        cells.on_paste(0, "12a34").unwrap();
        assert_eq!(digits(&cells), vec![Some('1'), Some('2'), Some('3'), Some('4')]);

        let mut cells = CodeCellArray::new();
        cells.on_paste(0, " 98-76-54 ").unwrap();
        assert_eq!(cells.buffer().code(), Some("9876".to_string()));
    }

    #[test]
    fn partial_paste_moves_focus_after_last_filled_cell() {
        let mut cells = CodeCellArray::new();
        assert_eq!(cells.on_paste(1, "5 6"), Ok(Mutation::Incomplete));
        assert_eq!(digits(&cells), vec![None, Some('5'), Some('6'), None]);
        assert_eq!(cells.focus(), Focus::Cell(3));

        cells.on_paste(2, "999").unwrap();
        assert_eq!(digits(&cells), vec![None, Some('5'), Some('9'), Some('9')]);
        assert_eq!(cells.focus(), Focus::Blurred);
    }

    #[test]
    fn paste_without_digits_is_rejected() {
        let mut cells = CodeCellArray::new();
        cells.on_digit_entered(0, '1').unwrap();
        assert_eq!(cells.on_paste(1, "abc"), Err(InputError::NoDigitsPasted));
        assert_eq!(cells.on_paste(1, ""), Err(InputError::NoDigitsPasted));
        assert_eq!(digits(&cells), vec![Some('1'), None, None, None]);
    }

    #[test]
    fn arrows_are_clamped() {
        let mut cells = CodeCellArray::new();
        assert_eq!(cells.on_key_action(0, KeyAction::ArrowLeft), Ok(Mutation::None));
        assert_eq!(cells.focus(), Focus::Cell(0));
        cells.on_key_action(2, KeyAction::ArrowRight).unwrap();
        assert_eq!(cells.focus(), Focus::Cell(3));
        cells.on_key_action(3, KeyAction::ArrowRight).unwrap();
        assert_eq!(cells.focus(), Focus::Cell(3));
        cells.on_key_action(3, KeyAction::ArrowLeft).unwrap();
        assert_eq!(cells.focus(), Focus::Cell(2));
    }

    #[test]
    fn backspace_on_filled_cell_clears_only_that_cell() {
        let mut cells = CodeCellArray::new();
        cells.on_paste(0, "123").unwrap();
        cells.focus_cell(2).unwrap();

        assert_eq!(cells.on_key_action(2, KeyAction::Backspace), Ok(Mutation::Incomplete));
        assert_eq!(digits(&cells), vec![Some('1'), Some('2'), None, None]);
        assert_eq!(cells.focus(), Focus::Cell(2));
    }

    #[test]
    fn backspace_on_empty_cell_merges_left() {
        let mut cells = CodeCellArray::new();
        cells.on_paste(0, "12").unwrap();
        assert_eq!(cells.focus(), Focus::Cell(2));

        assert_eq!(cells.on_key_action(2, KeyAction::Backspace), Ok(Mutation::Incomplete));
        assert_eq!(digits(&cells), vec![Some('1'), None, None, None]);
        assert_eq!(cells.focus(), Focus::Cell(1));
    }

    #[test]
    fn backspace_on_empty_first_cell_is_noop() {
        let mut cells = CodeCellArray::new();
        assert_eq!(cells.on_key_action(0, KeyAction::Backspace), Ok(Mutation::None));
        assert_eq!(cells.focus(), Focus::Cell(0));
        assert!(cells.buffer().is_empty());
    }

    #[test]
    fn disabled_grid_rejects_every_edit() {
        let mut cells = CodeCellArray::new();
        cells.on_digit_entered(0, '1').unwrap();
        cells.set_disabled(true);

        assert_eq!(cells.on_digit_entered(1, '2'), Err(InputError::Disabled));
        assert_eq!(cells.on_paste(1, "234"), Err(InputError::Disabled));
        assert_eq!(cells.on_key_action(1, KeyAction::Backspace), Err(InputError::Disabled));
        assert_eq!(digits(&cells), vec![Some('1'), None, None, None]);
    }

    #[test]
    fn disabled_grid_still_navigates() {
        let mut cells = CodeCellArray::new();
        cells.on_digit_entered(0, '1').unwrap();
        cells.set_disabled(true);

        assert_eq!(cells.on_key_action(1, KeyAction::ArrowLeft), Ok(Mutation::None));
        assert_eq!(cells.focus(), Focus::Cell(0));
        assert_eq!(cells.on_key_action(0, KeyAction::ArrowRight), Ok(Mutation::None));
        assert_eq!(cells.focus(), Focus::Cell(1));
        assert_eq!(cells.focus_cell(3), Ok(()));
        assert_eq!(cells.focus(), Focus::Cell(3));
        assert_eq!(cells.focus_cell(4), Err(InputError::OutOfRange(4)));
        assert_eq!(digits(&cells), vec![Some('1'), None, None, None]);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut cells = CodeCellArray::new();
        assert_eq!(cells.on_digit_entered(4, '1'), Err(InputError::OutOfRange(4)));
        assert_eq!(cells.on_paste(9, "1234"), Err(InputError::OutOfRange(9)));
    }

    #[test]
    fn clear_resets_buffer_and_focus() {
        let mut cells = CodeCellArray::new();
        cells.on_paste(0, "1234").unwrap();
        cells.clear();
        assert!(cells.buffer().is_empty());
        assert_eq!(cells.focus(), Focus::Cell(0));
        assert_eq!(cells.buffer().to_string(), "[ ][ ][ ][ ]");
    }
}
