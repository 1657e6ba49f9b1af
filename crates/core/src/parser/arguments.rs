use super::{Aborted, ArgValue, Argument, Expect, Parser, Visitor, VALUE_KINDS};
use crate::lexer::{Token, TokenKind};

fn starts_argument(t: &Token) -> bool {
    t.kind.is_value()
        || matches!(t.kind, TokenKind::Label | TokenKind::Error)
        || t.is_punct(',')
        || t.is_punct('[')
}

fn continues_list(t: &Token) -> bool {
    t.kind.is_value() || t.kind == TokenKind::Error || t.is_punct(',')
}

impl<'a, V: Visitor> Parser<'a, V> {
    pub(super) fn parse_argument_list(&mut self) -> Result<Vec<Argument>, Aborted> {
        let mut arguments = Vec::new();
        let mut first = true;
        while self.peek().is_some_and(starts_argument) {
            if !first {
                self.consume(&[Expect::Punct(',')])?;
            }
            first = false;
            if let Some(arg) = self.parse_argument()? {
                arguments.push(arg);
            }
        }
        Ok(arguments)
    }

    fn parse_argument(&mut self) -> Result<Option<Argument>, Aborted> {
        if !self.next_is(TokenKind::Label) {
            return Ok(self
                .parse_argument_value()?
                .map(|value| Argument { label: None, value }));
        }
        let label = self.advance().cloned();
        // a label without a usable value still counts as given
        let value = self
            .parse_argument_value()?
            .unwrap_or(ArgValue::List(Vec::new()));
        Ok(Some(Argument { label, value }))
    }

    fn parse_argument_value(&mut self) -> Result<Option<ArgValue>, Aborted> {
        if !self.next_is_punct('[') {
            return Ok(self.parse_value()?.map(ArgValue::Single));
        }
        self.consume(&[Expect::Punct('[')])?;
        let mut values = Vec::new();
        let mut first = true;
        while self.peek().is_some_and(continues_list) {
            if !first {
                self.consume(&[Expect::Punct(',')])?;
            }
            first = false;
            if let Some(v) = self.parse_value()? {
                values.push(v);
            }
        }
        self.consume(&[Expect::Punct(']')])?;
        Ok(Some(ArgValue::List(values)))
    }

    fn parse_value(&mut self) -> Result<Option<Token>, Aborted> {
        Ok(self.consume(&VALUE_KINDS)?.cloned())
    }
}
