mod isr;
