use super::OrderError;

/// One requested line: an item reference as the client sent it, and a
/// positive amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub item: String,
    pub amount: u32,
}

/// The validated, positionally paired lines of an order request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Pairs a comma-separated item list with a comma-separated amount list.
    ///
    /// Both lists must have the same length and every amount must be a
    /// positive integer. Item references are kept verbatim (trimmed); they
    /// are only checked against the catalog when the line is reserved.
    pub fn parse(items: &str, amounts: &str) -> Result<Self, OrderError> {
        let items: Vec<&str> = items.split(',').map(str::trim).collect();
        let amounts: Vec<&str> = amounts.split(',').map(str::trim).collect();

        if items.len() != amounts.len() {
            return Err(OrderError::MalformedCart {
                items: items.len(),
                amounts: amounts.len(),
            });
        }

        let lines = items
            .into_iter()
            .zip(amounts)
            .map(|(item, amount)| {
                Ok(CartLine {
                    item: item.to_string(),
                    amount: parse_amount(amount)?,
                })
            })
            .collect::<Result<Vec<_>, OrderError>>()?;

        Ok(Self { lines })
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

fn parse_amount(raw: &str) -> Result<u32, OrderError> {
    match raw.parse::<u32>() {
        Ok(amount) if amount > 0 => Ok(amount),
        _ => Err(OrderError::InvalidAmount(raw.to_string())),
    }
}
