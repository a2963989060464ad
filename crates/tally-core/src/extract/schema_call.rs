//! Structured-call extraction (`record_transaction` tool)

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::ai::{ModelRoute, StructuredCall, ToolSchema};
use crate::error::{ExtractionError, Result};
use crate::models::{Category, NewTransaction, TransactionKind};
use crate::prompts::{Prompt, PromptId, PromptLibrary};

use super::{normalize_category, require_text, ExtractionStrategy, Extracted, StrategyKind};

/// Name of the declared tool
pub const RECORD_TOOL: &str = "record_transaction";

/// Tool schema for `record_transaction`
pub fn record_transaction_tool() -> ToolSchema {
    let categories: Vec<&str> = Category::all().iter().map(|c| c.as_str()).collect();
    ToolSchema::new(
        RECORD_TOOL,
        "Record one personal finance transaction described by the user.",
        json!({
            "type": "object",
            "properties": {
                "category": {
                    "type": "string",
                    "enum": categories,
                    "description": "Spending or income category"
                },
                "amount": {
                    "type": "integer",
                    "description": "Whole amount in VND, non-negative"
                },
                "type": {
                    "type": "string",
                    "enum": [TransactionKind::Expense.as_str(), TransactionKind::Income.as_str()]
                },
                "note": {
                    "type": "string",
                    "description": "Short description of the transaction"
                }
            },
            "required": ["category", "amount", "type"]
        }),
    )
}

/// Asks the model to call `record_transaction`
pub struct SchemaCallStrategy<R> {
    route: R,
    prompt: Prompt,
    tool: ToolSchema,
}

impl<R: ModelRoute> SchemaCallStrategy<R> {
    pub fn new(route: R, prompts: &mut PromptLibrary) -> Result<Self> {
        let prompt = prompts.get(PromptId::ExtractSchemaCall)?.clone();
        Ok(Self {
            route,
            prompt,
            tool: record_transaction_tool(),
        })
    }
}

#[async_trait]
impl<R: ModelRoute> ExtractionStrategy for SchemaCallStrategy<R> {
    async fn extract_detailed(&self, text: &str) -> Result<Extracted> {
        let input = require_text(text)?;
        let mut vars = HashMap::new();
        vars.insert("text", input);

        let request = self.prompt.to_request(&vars).with_tool(self.tool.clone());
        let answer = self.route.run(&request).await?;

        let transaction = match answer.reply.call {
            Some(call) => parse_record_call(&call)?,
            None => {
                let commentary = answer.reply.text.unwrap_or_default();
                return Err(ExtractionError::not_a_transaction(commentary.trim()).into());
            }
        };

        debug!(
            model = %answer.model,
            category = %transaction.category,
            amount = transaction.amount,
            kind = %transaction.kind,
            "Schema-call extraction succeeded"
        );
        Ok(Extracted {
            transaction,
            model: answer.model,
        })
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Schema
    }
}

/// Read a `record_transaction` call into a transaction
pub fn parse_record_call(call: &StructuredCall) -> std::result::Result<NewTransaction, ExtractionError> {
    if call.name != RECORD_TOOL {
        return Err(ExtractionError::format_mismatch(format!(
            "unexpected tool '{}'",
            call.name
        )));
    }

    let category = match call.args.get("category") {
        Some(Value::String(label)) => normalize_category(label),
        Some(other) => {
            return Err(ExtractionError::format_mismatch(format!(
                "category must be a string, got {}",
                other
            )))
        }
        None => return Err(ExtractionError::format_mismatch("missing field 'category'")),
    };

    let amount = match call.args.get("amount") {
        Some(value) => amount_from_json(value)?,
        None => return Err(ExtractionError::format_mismatch("missing field 'amount'")),
    };

    let kind = match call.args.get("type") {
        Some(Value::String(s)) => s.parse::<TransactionKind>().map_err(ExtractionError::format_mismatch)?,
        Some(other) => {
            return Err(ExtractionError::format_mismatch(format!(
                "type must be a string, got {}",
                other
            )))
        }
        None => return Err(ExtractionError::format_mismatch("missing field 'type'")),
    };

    let note = match call.args.get("note") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => {
            return Err(ExtractionError::format_mismatch(format!(
                "note must be a string, got {}",
                other
            )))
        }
    };

    Ok(NewTransaction {
        category,
        amount,
        kind,
        note,
    })
}

/// Non-negative JSON integer; whole floats like `25000.0` are accepted
fn amount_from_json(value: &Value) -> std::result::Result<u64, ExtractionError> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    if let Some(f) = value.as_f64() {
        if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
            return Ok(f as u64);
        }
    }
    Err(ExtractionError::amount_not_numeric(format!(
        "amount must be a non-negative integer, got {}",
        value
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{MockBackend, ModelReply, PinnedModel};
    use crate::error::{Error, ExtractionErrorKind};

    fn call(args: Value) -> StructuredCall {
        StructuredCall {
            name: RECORD_TOOL.to_string(),
            args: args.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_tool_schema_shape() {
        let tool = record_transaction_tool();
        assert_eq!(tool.name, "record_transaction");
        let required = tool.parameters["required"].as_array().unwrap();
        assert_eq!(required.len(), 3);
        let categories = tool.parameters["properties"]["category"]["enum"].as_array().unwrap();
        assert_eq!(categories.len(), Category::all().len());
        assert_eq!(tool.parameters["properties"]["amount"]["type"], "integer");
    }

    #[test]
    fn test_parse_full_call() {
        let tx = parse_record_call(&call(json!({
            "category": "Food",
            "amount": 40000,
            "type": "Expense",
            "note": "Ăn phở"
        })))
        .unwrap();
        assert_eq!(tx.category, Category::Food);
        assert_eq!(tx.amount, 40_000);
        assert_eq!(tx.kind, TransactionKind::Expense);
        assert_eq!(tx.note, "Ăn phở");
    }

    #[test]
    fn test_missing_note_is_empty() {
        let tx = parse_record_call(&call(json!({
            "category": "Salary",
            "amount": 15000000,
            "type": "Income"
        })))
        .unwrap();
        assert_eq!(tx.note, "");
        assert_eq!(tx.kind, TransactionKind::Income);
    }

    #[test]
    fn test_vietnamese_and_unknown_categories() {
        let vi = parse_record_call(&call(json!({"category": "Di chuyển", "amount": 1, "type": "Expense"}))).unwrap();
        assert_eq!(vi.category, Category::Transport);
        let unknown = parse_record_call(&call(json!({"category": "Travel", "amount": 1, "type": "Expense"}))).unwrap();
        assert_eq!(unknown.category, Category::Other);
    }

    #[test]
    fn test_missing_required_field_is_format_mismatch() {
        for args in [
            json!({"amount": 1, "type": "Expense"}),
            json!({"category": "Food", "type": "Expense"}),
            json!({"category": "Food", "amount": 1}),
            json!({"category": "Food", "amount": 1, "type": "Transfer"}),
            json!({"category": 3, "amount": 1, "type": "Expense"}),
        ] {
            let err = parse_record_call(&call(args.clone())).unwrap_err();
            assert_eq!(err.kind, ExtractionErrorKind::FormatMismatch, "{}", args);
        }
    }

    #[test]
    fn test_wrong_tool_name_is_format_mismatch() {
        let mut c = call(json!({"category": "Food", "amount": 1, "type": "Expense"}));
        c.name = "lookup_weather".to_string();
        assert_eq!(
            parse_record_call(&c).unwrap_err().kind,
            ExtractionErrorKind::FormatMismatch
        );
    }

    #[test]
    fn test_bad_amounts_are_not_numeric() {
        for amount in [json!(-5), json!(12.5), json!("40000"), json!(null)] {
            let err = parse_record_call(&call(json!({
                "category": "Food", "amount": amount, "type": "Expense"
            })))
            .unwrap_err();
            assert_eq!(err.kind, ExtractionErrorKind::AmountNotNumeric, "{}", amount);
        }
        let whole_float = parse_record_call(&call(json!({
            "category": "Food", "amount": 25000.0, "type": "Expense"
        })))
        .unwrap();
        assert_eq!(whole_float.amount, 25_000);
    }

    #[tokio::test]
    async fn test_strategy_sends_tool_and_reads_call() {
        let mock = MockBackend::new().with_reply(
            "m",
            ModelReply::from_call(
                RECORD_TOOL,
                json!({"category": "Bills", "amount": 450000, "type": "Expense", "note": "Tiền điện"}),
            ),
        );
        let mut prompts = PromptLibrary::embedded_only();
        let strategy = SchemaCallStrategy::new(PinnedModel::new(mock.clone(), "m"), &mut prompts).unwrap();

        let extracted = strategy.extract_detailed("Tiền điện 450k").await.unwrap();
        assert_eq!(extracted.transaction.category, Category::Bills);
        assert_eq!(extracted.model, "m");

        let requests = mock.requests();
        assert_eq!(requests[0].1.tool.as_ref().unwrap().name, RECORD_TOOL);
        assert!(requests[0].1.system.is_some());
    }

    #[tokio::test]
    async fn test_commentary_is_not_a_transaction() {
        let mock = MockBackend::new().with_reply("m", ModelReply::from_text("Hôm nay trời đẹp quá!"));
        let mut prompts = PromptLibrary::embedded_only();
        let strategy = SchemaCallStrategy::new(PinnedModel::new(mock, "m"), &mut prompts).unwrap();

        match strategy.extract("Hôm nay trời đẹp").await.unwrap_err() {
            Error::Extraction(e) => {
                assert_eq!(e.kind, ExtractionErrorKind::NotATransaction);
                assert_eq!(e.detail, "Hôm nay trời đẹp quá!");
            }
            other => panic!("Expected extraction error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_heuristic_mock_round_trip() {
        let mut prompts = PromptLibrary::embedded_only();
        let strategy =
            SchemaCallStrategy::new(PinnedModel::new(MockBackend::new(), "any"), &mut prompts).unwrap();
        let tx = strategy.extract("Cafe sáng 25k").await.unwrap();
        assert_eq!(tx.category, Category::Food);
        assert_eq!(tx.amount, 25_000);
        assert_eq!(tx.kind, TransactionKind::Expense);
        assert_eq!(tx.note, "Cafe sáng 25k");
    }
}
