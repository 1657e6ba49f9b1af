use super::{Aborted, BlockElement, Comment, CommentKind, Expect, Parser, Statement, Visitor};
use crate::error::Problem;
use crate::lexer::TokenKind;

impl<'a, V: Visitor> Parser<'a, V> {
    // -- Statements -----------------------------------------------

    /// Parse one statement. With `allow_unassociated` a comment block that
    /// is not followed by a command is handed to the visitor on its own.
    pub(super) fn parse_statement(
        &mut self,
        is_root: bool,
        allow_unassociated: bool,
    ) -> Result<Option<V::Output>, Aborted> {
        let comment = self.parse_line_block(TokenKind::Comment)?;
        let annotation = self.parse_line_block(TokenKind::Annotation)?;

        if !self.next_is(TokenKind::Identifier) && allow_unassociated {
            let had_text = comment.is_some() || annotation.is_some();
            if let Some((text, line)) = comment {
                self.visitor.unassociated_comment(Comment {
                    text,
                    kind: CommentKind::Unassociated,
                    line,
                });
            }
            if let Some((_, line)) = annotation {
                self.problems
                    .push(Problem::new("Annotation without command", line));
            }
            if !had_text {
                self.consume(&[Expect::Kind(TokenKind::Identifier)])?;
                self.discard_until_newline();
            }
            return Ok(None);
        }

        let mut comments = Vec::new();
        if let Some((text, line)) = comment {
            comments.push(Comment {
                text,
                kind: CommentKind::Above,
                line,
            });
        }

        let Some(command) = self.consume(&[Expect::Kind(TokenKind::Identifier)])? else {
            self.resync();
            return Ok(None);
        };

        let scope = self.visitor.descend(command, self.scopes.last());
        self.scopes.push(scope);

        let arguments = self.parse_argument_list()?;
        let elements = if self.next_is_punct('{') {
            self.parse_block(&mut comments)?
        } else {
            Vec::new()
        };
        self.parse_eol_comment(&mut comments);
        self.end_of_line()?;

        let statement = Statement {
            command: command.clone(),
            arguments,
            elements,
            comments,
            annotation: annotation.map(|(text, _)| text),
            is_root,
        };
        Ok(match self.scopes.pop() {
            Some(scope) => self.visitor.ascend(statement, scope),
            None => None,
        })
    }

    /// Consecutive whole-line comments or annotations, joined by newlines,
    /// together with the line of the first one.
    fn parse_line_block(&mut self, kind: TokenKind) -> Result<Option<(String, u32)>, Aborted> {
        let mut lines: Vec<String> = Vec::new();
        let mut first_line = None;
        while self.next_is(kind) {
            let Some(t) = self.advance() else { break };
            first_line.get_or_insert(t.line);
            lines.push(t.text());
            self.consume(&[Expect::Kind(TokenKind::Newline)])?;
        }
        Ok(first_line.map(|line| (lines.join("\n"), line)))
    }

    fn parse_eol_comment(&mut self, comments: &mut Vec<Comment>) {
        if self.next_is(TokenKind::Comment) {
            if let Some(t) = self.advance() {
                comments.push(Comment {
                    text: t.text(),
                    kind: CommentKind::Eol,
                    line: t.line,
                });
            }
        }
    }

    // -- Blocks ---------------------------------------------------

    fn parse_block(
        &mut self,
        comments: &mut Vec<Comment>,
    ) -> Result<Vec<BlockElement<V::Output>>, Aborted> {
        self.consume(&[Expect::Punct('{')])?;
        self.parse_eol_comment(comments);
        self.end_of_line()?;

        let mut elements = Vec::new();
        while self.peek().is_some() && !self.next_is_punct('}') {
            self.parse_block_element(&mut elements, comments)?;
        }
        self.consume(&[Expect::Punct('}')])?;
        Ok(elements)
    }

    fn parse_block_element(
        &mut self,
        elements: &mut Vec<BlockElement<V::Output>>,
        comments: &mut Vec<Comment>,
    ) -> Result<(), Aborted> {
        if !self.next_is(TokenKind::Label) {
            if let Some(child) = self.parse_statement(false, true)? {
                elements.push(BlockElement::Child(child));
            }
            return Ok(());
        }

        let Some(role) = self.advance().cloned() else {
            return Ok(());
        };
        if self.next_is_punct('[') {
            let children = self.parse_element_list(comments)?;
            elements.push(BlockElement::Labeled {
                role,
                children,
                list: true,
            });
            return Ok(());
        }

        // the child may follow on the same line or on the next one
        if self.next_is(TokenKind::Comment) || self.next_is(TokenKind::Newline) {
            self.parse_eol_comment(comments);
            self.end_of_line()?;
        }
        let children = self.parse_statement(false, false)?.into_iter().collect();
        elements.push(BlockElement::Labeled {
            role,
            children,
            list: false,
        });
        Ok(())
    }

    fn parse_element_list(&mut self, comments: &mut Vec<Comment>) -> Result<Vec<V::Output>, Aborted> {
        self.consume(&[Expect::Punct('[')])?;
        self.parse_eol_comment(comments);
        self.end_of_line()?;

        let mut children = Vec::new();
        while self.peek().is_some() && !self.next_is_punct(']') {
            if let Some(child) = self.parse_statement(false, true)? {
                children.push(child);
            }
        }
        self.consume(&[Expect::Punct(']')])?;
        self.parse_eol_comment(comments);
        self.end_of_line()?;
        Ok(children)
    }
}
