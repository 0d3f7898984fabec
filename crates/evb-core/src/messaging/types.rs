/// Inline keyboard (buttons) attached to an outgoing message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub buttons: Vec<InlineButton>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineKeyboard {
    /// Rows of one button each, labels cut to `max_label_len` characters.
    pub fn one_per_row<I>(entries: I, max_label_len: usize) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let buttons = entries
            .into_iter()
            .map(|(label, callback_data)| {
                let label = if label.chars().count() > max_label_len {
                    format!("{}...", label.chars().take(max_label_len).collect::<String>())
                } else {
                    label
                };
                InlineButton {
                    label,
                    callback_data,
                }
            })
            .collect();
        Self { buttons }
    }
}
