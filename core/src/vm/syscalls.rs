//! file: core/src/vm/syscalls.rs
//! description: the system calls the virtual machine implements itself.
//!
//! Arguments arrive on the value stack in call order, so they are popped in
//! reverse. The result, if any, is pushed back for the caller to pop.

use log::trace;

use crate::error::{UnsupportedOperationError, boxed};
use crate::ir::syscall::Syscall;
use crate::types::IrDataType;
use crate::vm::exec::signed;
use crate::vm::{StackValue, VirtualMachine, VmResult};

impl VirtualMachine {
    pub(crate) fn syscall(&mut self, number: i32) -> VmResult<()> {
        let call = Syscall::from_number(number)
            .ok_or_else(|| boxed(UnsupportedOperationError::new(format!("syscall #{}", number)).at(self.pc)))?;
        trace!("syscall {}", call);
        match call {
            Syscall::CompareStrings => {
                let second = self.pop_int()?;
                let first = self.pop_int()?;
                let a = self.memory.read_cstring(first as u32).map_err(|e| boxed(e.at(self.pc)))?;
                let b = self.memory.read_cstring(second as u32).map_err(|e| boxed(e.at(self.pc)))?;
                let result = match a.cmp(&b) {
                    std::cmp::Ordering::Less => 0xff,
                    std::cmp::Ordering::Equal => 0,
                    std::cmp::Ordering::Greater => 1,
                };
                self.push_value(StackValue::Byte(result));
            }
            Syscall::ClampUByte | Syscall::ClampUWord => {
                let dt = if call == Syscall::ClampUByte { IrDataType::Byte } else { IrDataType::Word };
                let max = self.pop_int()?;
                let min = self.pop_int()?;
                let value = self.pop_int()?;
                self.push_int(dt, value.clamp(min, max.max(min)));
            }
            Syscall::ClampByte | Syscall::ClampWord => {
                let dt = if call == Syscall::ClampByte { IrDataType::Byte } else { IrDataType::Word };
                let max = signed(dt, self.pop_int()?);
                let min = signed(dt, self.pop_int()?);
                let value = signed(dt, self.pop_int()?);
                self.push_int(dt, value.clamp(min, max.max(min)) as u16);
            }
            Syscall::ClampFloat => {
                let max = self.pop_float()?;
                let min = self.pop_float()?;
                let value = self.pop_float()?;
                self.push_value(StackValue::Float(value.max(min).min(max.max(min))));
            }
            Syscall::CallFar | Syscall::CallFar2 => {
                return Err(boxed(UnsupportedOperationError::new(format!("{} into banked memory", call)).at(self.pc)));
            }
        }
        Ok(())
    }
}
