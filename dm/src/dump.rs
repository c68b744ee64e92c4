//! Human readable listing of the device tree.

use core::fmt::{Display, Formatter, Result};

use crate::{device::DeviceId, manager::DeviceManager};

/// `Display` adapter printing one line per device, children indented below their parent.
///
/// ```text
///  Class       Seq  Active  Driver        Name
///  root          0  +       root_driver   root_driver
///  simple_bus    0  +       simple_bus    `-- soc
/// ```
pub struct TreeDump<'a> {
    dm: &'a DeviceManager,
}

impl DeviceManager {
    pub fn dump(&self) -> TreeDump<'_> {
        TreeDump { dm: self }
    }
}

impl TreeDump<'_> {
    fn line(&self, f: &mut Formatter<'_>, id: DeviceId, depth: usize) -> Result {
        let Ok(dev) = self.dm.device(id) else {
            return Ok(());
        };
        let seq = dev.seq().map_or(-1, |s| s as i64);
        write!(
            f,
            " {:<10} {:>4}  {:<6}  {:<12}  ",
            dev.category().name,
            seq,
            if dev.is_active() { "+" } else { "" },
            dev.driver().name,
        )?;
        for _ in 1..depth {
            f.write_str("    ")?;
        }
        if depth > 0 {
            f.write_str("`-- ")?;
        }
        writeln!(f, "{}", dev.name())?;
        for child in dev.children() {
            self.line(f, *child, depth + 1)?;
        }
        Ok(())
    }
}

impl Display for TreeDump<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(
            f,
            " {:<10} {:>4}  {:<6}  {:<12}  Name",
            "Class", "Seq", "Active", "Driver"
        )?;
        self.line(f, self.dm.root(), 0)
    }
}
