//! NDJSON 命令解析

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use teleop_sdk::types::DeltaCommand;

/// 解析一行输入
///
/// 空行与 `#` 注释行返回 `Ok(None)`；缺字段或格式错误返回错误。
pub fn parse_line(line: &str) -> Result<Option<DeltaCommand>, serde_json::Error> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(trimmed).map(Some)
}

/// 读取整个命令文件
///
/// 任何一行格式错误都会以行号报错。
pub fn load_commands<P: AsRef<Path>>(path: P) -> Result<Vec<DeltaCommand>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read command file {}", path.display()))?;

    let mut commands = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let parsed = parse_line(line)
            .with_context(|| format!("{}:{}: malformed command", path.display(), index + 1))?;
        if let Some(command) = parsed {
            commands.push(command);
        }
    }
    Ok(commands)
}
