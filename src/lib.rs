// NL compiler front end: lexer, parser, identifier/type resolvers, and
// a bytecode VM for compile-time constant evaluation.
//
// Copyright (C) 2019  Brandon Lewis
//
// This program is free software: you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public License
// as published by the Free Software Foundation, either version 3 of
// the License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this program.  If not, see
// <https://www.gnu.org/licenses/>.

pub mod ast;
pub mod bytecode;
pub mod compiler;
pub mod diagnostics;
pub mod driver;
pub mod ids;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod reader;
pub mod resolver;
pub mod source;
pub mod typecheck;
pub mod types;
#[macro_use]
pub mod util;
pub mod visitor;
pub mod vm;
