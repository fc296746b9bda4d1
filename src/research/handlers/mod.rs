//! 各动作的处理器：均为 `Researcher` 的方法，只通过 `&mut Session` 修改会话状态

mod answer;
mod coding;
mod reflect;
mod search;
mod visit;
